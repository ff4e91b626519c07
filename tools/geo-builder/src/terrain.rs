//! land_map.h32 heightmaps

use crate::placement::{PlacementError, format_err};

/// Surface index marking a hole in the terrain
pub const CUTOUT_SURFACE: u8 = 0x3F;

/// Height written for cutout points; never valid as a real height
pub const CUTOUT_HEIGHT: i16 = i16::MIN;

const POINT_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainPoint {
    /// [`CUTOUT_HEIGHT`] for cutouts
    pub height: i16,
    pub material: u8,
}

impl TerrainPoint {
    pub fn is_cutout(&self) -> bool {
        self.height == CUTOUT_HEIGHT
    }
}

/// Decoded heightmap of one level, row major
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Terrain {
    pub points: Vec<TerrainPoint>,
}

/// How a level's terrain is stored in its geo file
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerrainBlock<'a> {
    Empty,
    /// Same height everywhere, no cutouts and no materials
    Flat(i16),
    Points(&'a [TerrainPoint]),
}

impl<'a> TerrainBlock<'a> {
    pub fn of(terrain: Option<&'a Terrain>) -> Self {
        let Some(first) = terrain.and_then(|t| t.points.first()) else {
            return TerrainBlock::Empty;
        };
        let points = terrain.map(|t| t.points.as_slice()).unwrap_or_default();
        let flat = points
            .iter()
            .all(|p| p.height == first.height && p.material == 0 && !p.is_cutout());
        if flat {
            TerrainBlock::Flat(first.height)
        } else {
            TerrainBlock::Points(points)
        }
    }
}

impl Terrain {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Edge length of the square heightmap, if the point count is a square
    pub fn side(&self) -> Option<u32> {
        let n = self.points.len();
        let side = (n as f64).sqrt().round() as usize;
        (side > 0 && side * side == n)
            .then_some(side)
            .and_then(|s| u32::try_from(s).ok())
    }
}

/// Decode a heightmap, mapping surface indices through `materials`
///
/// Surface indices past the end of `materials` get material 0.
pub fn decode_terrain(data: &[u8], materials: &[u8]) -> Result<Terrain, PlacementError> {
    if data.len() % POINT_LEN != 0 {
        return Err(format_err(format!(
            "heightmap size {} is not a multiple of {POINT_LEN}",
            data.len()
        )));
    }

    let mut points = Vec::with_capacity(data.len() / POINT_LEN);
    for (i, chunk) in data.chunks_exact(POINT_LEN).enumerate() {
        let height = i16::from_le_bytes([chunk[0], chunk[1]]);
        if height == CUTOUT_HEIGHT {
            return Err(format_err(format!("reserved height at point {i}")));
        }
        let surface = chunk[2];
        let point = if surface == CUTOUT_SURFACE {
            TerrainPoint {
                height: CUTOUT_HEIGHT,
                material: 0,
            }
        } else {
            TerrainPoint {
                height,
                material: materials.get(usize::from(surface)).copied().unwrap_or(0),
            }
        };
        points.push(point);
    }
    Ok(Terrain { points })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(points: &[(i16, u8)]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|(h, s)| {
                let [a, b] = h.to_le_bytes();
                [a, b, *s]
            })
            .collect()
    }

    #[test]
    fn test_decode_terrain() {
        let data = encode(&[(10, 0), (-5, 1), (7, CUTOUT_SURFACE), (3, 9)]);
        let terrain = decode_terrain(&data, &[0, 11]).unwrap();

        assert_eq!(terrain.len(), 4);
        assert_eq!(terrain.side(), Some(2));
        assert_eq!(terrain.points[1], TerrainPoint { height: -5, material: 11 });
        assert!(terrain.points[2].is_cutout());
        assert_eq!(terrain.points[3].material, 0);
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_terrain(&[0, 0], &[]).is_err());
        let data = encode(&[(i16::MIN, 0)]);
        assert!(matches!(decode_terrain(&data, &[]), Err(PlacementError::Format(_))));
    }

    #[test]
    fn test_terrain_block() {
        assert_eq!(TerrainBlock::of(None), TerrainBlock::Empty);
        assert_eq!(TerrainBlock::of(Some(&Terrain::default())), TerrainBlock::Empty);

        let flat = decode_terrain(&encode(&[(42, 0); 4]), &[0]).unwrap();
        assert_eq!(TerrainBlock::of(Some(&flat)), TerrainBlock::Flat(42));

        let cut = decode_terrain(&encode(&[(42, 0), (42, CUTOUT_SURFACE)]), &[0]).unwrap();
        assert!(matches!(TerrainBlock::of(Some(&cut)), TerrainBlock::Points(p) if p.len() == 2));

        let lava = decode_terrain(&encode(&[(42, 0), (42, 1)]), &[0, 11]).unwrap();
        assert!(matches!(TerrainBlock::of(Some(&lava)), TerrainBlock::Points(_)));
    }

    #[test]
    fn test_side_of_non_square() {
        let terrain = decode_terrain(&encode(&[(1, 0); 3]), &[]).unwrap();
        assert_eq!(terrain.side(), None);
    }
}
