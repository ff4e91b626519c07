//! <level id>.geo writer

use super::{MeshLibrary, write_f32s, write_name};
use crate::placement::{MAX_TOWN_STAGE, Placement, PlacementKind, town_stage_mesh};
use crate::terrain::{Terrain, TerrainBlock};
use anyhow::Result;
use std::io::Write;

/// What ended up in one geo file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoStats {
    pub terrain_points: usize,
    pub written: usize,
    /// Placements whose mesh is not in the library
    pub skipped: usize,
}

/// Write the terrain block followed by every placement whose mesh is stored
pub fn write_geo<W: Write>(
    w: &mut W,
    terrain: Option<&Terrain>,
    placements: &[Placement],
    library: &MeshLibrary,
) -> Result<GeoStats> {
    let mut stats = GeoStats::default();

    match TerrainBlock::of(terrain) {
        TerrainBlock::Empty => {
            w.write_all(&[0])?;
            w.write_all(&0i16.to_le_bytes())?;
        }
        TerrainBlock::Flat(height) => {
            w.write_all(&[0])?;
            w.write_all(&height.to_le_bytes())?;
        }
        TerrainBlock::Points(points) => {
            w.write_all(&[1])?;
            w.write_all(&i32::try_from(points.len())?.to_le_bytes())?;
            for point in points {
                w.write_all(&point.height.to_le_bytes())?;
                w.write_all(&[point.material])?;
            }
            stats.terrain_points = points.len();
        }
    }

    for placement in placements {
        if placement.kind == PlacementKind::Town {
            for stage in placement.sub_level.max(1)..=MAX_TOWN_STAGE {
                match nearest_stage(&placement.mesh, stage, library) {
                    Some(mesh) => {
                        write_placement(w, placement, &mesh, stage)?;
                        stats.written += 1;
                    }
                    None => stats.skipped += 1,
                }
            }
        } else if library.contains(&placement.mesh) {
            write_placement(w, placement, &placement.mesh, placement.sub_level)?;
            stats.written += 1;
        } else {
            stats.skipped += 1;
        }
    }
    Ok(stats)
}

/// Stored town mesh for `stage`, falling back to lower stages
fn nearest_stage(base: &str, stage: u8, library: &MeshLibrary) -> Option<String> {
    (1..=stage)
        .rev()
        .map(|s| town_stage_mesh(base, s))
        .find(|mesh| library.contains(mesh))
}

fn write_placement<W: Write>(w: &mut W, placement: &Placement, mesh: &str, sub_level: u8) -> Result<()> {
    write_name(w, mesh)?;
    write_f32s(w, &placement.position.to_array())?;
    for row in 0..3 {
        write_f32s(w, &placement.rotation.row(row).to_array())?;
    }
    write_f32s(w, &placement.scale.to_array())?;
    w.write_all(&[placement.kind.id()])?;
    w.write_all(&placement.field.to_le_bytes())?;
    w.write_all(&[sub_level, 0])?;
    Ok(())
}
