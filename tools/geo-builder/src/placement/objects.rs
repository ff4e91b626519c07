//! objects.lst decoding (vegetation)

use super::{LevelData, MeshDemand, Placement, PlacementError, PlacementKind, from_rows};
use crate::read::{read_f32, read_i32, read_u8, read_u16, remaining};
use glam::{Mat3, Vec3};
use std::io::Cursor;

const OBJECTS_MAGIC: i32 = 0x10;

const RECORD_LEN: usize = 16;

/// Quantization step of positions
const POSITION_STEPS: f32 = 65_536.0;

/// Quantization step of angles
const ANGLE_STEPS: f32 = 256.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    /// Index into [`LevelData::vegetation`]
    pub mesh_index: usize,
    pub position: Vec3,
    pub scale: f32,
    /// Angles in degrees
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
}

impl ObjectEntry {
    /// `Rx * Ry * Rz` in the list's row-vector convention, as a column-vector rotation
    pub fn rotation(&self) -> Mat3 {
        let (sx, cx) = self.rot_x.to_radians().sin_cos();
        let (sy, cy) = self.rot_y.to_radians().sin_cos();
        let (sz, cz) = self.rot_z.to_radians().sin_cos();
        let rx = from_rows([[1.0, 0.0, 0.0], [0.0, cx, sx], [0.0, -sx, cx]]);
        let ry = from_rows([[cy, 0.0, -sy], [0.0, 1.0, 0.0], [sy, 0.0, cy]]);
        let rz = from_rows([[cz, sz, 0.0], [-sz, cz, 0.0], [0.0, 0.0, 1.0]]);
        (rx * ry * rz).transpose()
    }
}

/// Decode vegetation records scaled to the level's map size
pub fn decode_objects(data: &[u8], level: &LevelData) -> Result<Vec<ObjectEntry>, PlacementError> {
    let mut cursor = Cursor::new(data);
    if read_i32(&mut cursor)? != OBJECTS_MAGIC {
        return Err(PlacementError::InvalidSignature);
    }

    let (map_x, map_y) = level.map_size();
    let mut entries = Vec::with_capacity(remaining(&cursor) / RECORD_LEN);
    while remaining(&cursor) > 0 {
        let x = f32::from(read_u16(&mut cursor)?) * map_x / POSITION_STEPS;
        let y = f32::from(read_u16(&mut cursor)?) * map_y / POSITION_STEPS;
        let z = f32::from(read_u16(&mut cursor)?) * map_x / POSITION_STEPS;
        let mesh_index = usize::from(read_u8(&mut cursor)?);
        read_u8(&mut cursor)?;
        let scale = read_f32(&mut cursor)?;
        let rot_z = angle(read_u8(&mut cursor)?);
        let rot_y = angle(read_u8(&mut cursor)?);
        let rot_x = angle(read_u8(&mut cursor)?);
        read_u8(&mut cursor)?;

        entries.push(ObjectEntry {
            mesh_index,
            position: Vec3::new(x, y, z),
            scale,
            rot_x,
            rot_y,
            rot_z,
        });
    }
    Ok(entries)
}

fn angle(raw: u8) -> f32 {
    f32::from(raw) * 360.0 / ANGLE_STEPS
}

/// Placements and demand for decoded records
///
/// Records pointing past the vegetation list are dropped.
pub fn object_placements(entries: &[ObjectEntry], level: &LevelData) -> (Vec<Placement>, MeshDemand) {
    let mut placements = Vec::with_capacity(entries.len());
    let mut demand = MeshDemand::default();
    let mut seen = vec![false; level.vegetation.len()];
    let mut dropped = 0usize;

    for entry in entries {
        let Some(mesh) = level.vegetation.get(entry.mesh_index) else {
            dropped += 1;
            continue;
        };
        if !seen[entry.mesh_index] {
            seen[entry.mesh_index] = true;
            demand.required.push(mesh.clone());
        }
        placements.push(Placement {
            mesh: mesh.clone(),
            position: entry.position,
            rotation: entry.rotation(),
            scale: Vec3::splat(entry.scale),
            kind: PlacementKind::None,
            field: 0,
            sub_level: 0,
        });
    }

    if dropped > 0 {
        tracing::warn!(
            dropped,
            vegetation = level.vegetation.len(),
            "objects.lst records reference missing vegetation meshes"
        );
    }
    (placements, demand)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Objects list writer for tests: `(x, y, z, mesh, scale, [rot_z, rot_y, rot_x])`
    pub(crate) fn encode_objects(records: &[(u16, u16, u16, u8, f32, [u8; 3])]) -> Vec<u8> {
        let mut out = OBJECTS_MAGIC.to_le_bytes().to_vec();
        for (x, y, z, mesh, scale, rot) in records {
            for v in [x, y, z] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.push(*mesh);
            out.push(0xFF);
            out.extend_from_slice(&scale.to_le_bytes());
            out.extend_from_slice(rot);
            out.push(0);
        }
        out
    }

    fn level() -> LevelData {
        LevelData {
            heightmap_x: 1024,
            heightmap_y: 512,
            unit_size: 2,
            vegetation: vec!["levels/common/tree.cgf".into()],
            surface_materials: Vec::new(),
        }
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-4), "{a} != {b}");
    }

    #[test]
    fn test_decode_objects() {
        let data = encode_objects(&[
            (32_768, 16_384, 256, 0, 1.5, [64, 0, 0]),
            (0, 0, 0, 7, 1.0, [0, 0, 0]),
        ]);
        let entries = decode_objects(&data, &level()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_close(entries[0].position, Vec3::new(1024.0, 256.0, 8.0));
        assert_eq!(entries[0].scale, 1.5);
        assert_eq!(entries[0].rot_z, 90.0);
        assert_eq!(entries[0].rot_x, 0.0);

        let (placements, demand) = object_placements(&entries, &level());
        assert_eq!(placements.len(), 1, "out-of-range mesh index is dropped");
        assert_eq!(placements[0].scale, Vec3::splat(1.5));
        assert_eq!(placements[0].kind, PlacementKind::None);
        assert_eq!(demand.required, ["levels/common/tree.cgf"]);
    }

    #[test]
    fn test_rotation_matches_row_vector_product() {
        let entry = ObjectEntry {
            mesh_index: 0,
            position: Vec3::ZERO,
            scale: 1.0,
            rot_x: 0.0,
            rot_y: 0.0,
            rot_z: 90.0,
        };
        // Rz row 1 is (c, s, 0): x maps to +y for a row vector
        assert_close(entry.rotation() * Vec3::X, Vec3::Y);
        assert_close(entry.rotation().row(0), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        let mut data = encode_objects(&[(0, 0, 0, 0, 1.0, [0, 0, 0])]);
        assert!(decode_objects(&data[..data.len() - 1], &level()).is_err());
        data[0] = 0x11;
        assert!(matches!(
            decode_objects(&data, &level()),
            Err(PlacementError::InvalidSignature)
        ));
    }
}
