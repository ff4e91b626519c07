//! brush.lst decoding

use super::{MeshDemand, Placement, PlacementError, PlacementKind, format_err, from_rows, sanitize_path};
use crate::read::{read_bytes, read_f32, read_i32, read_u8, skip};
use glam::Vec3;
use std::io::Cursor;

const BRUSH_MAGIC: &[u8; 3] = b"CRY";

/// Bytes of the fixed-size mesh name field
const MESH_NAME_LEN: usize = 128;

/// A decoded brush list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrushList {
    /// Sanitized mesh names, indexed by [`BrushEntry::mesh_index`]
    pub meshes: Vec<String>,
    pub entries: Vec<BrushEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrushEntry {
    pub mesh_index: usize,
    /// Row-major 3x4 transform, translation in elements 3, 7 and 11
    pub matrix: [f32; 12],
    /// Server event decoration mask (0 = always present)
    pub event: u8,
}

impl BrushEntry {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.matrix[3], self.matrix[7], self.matrix[11])
    }
}

/// Decode a brush list
pub fn decode_brush_list(data: &[u8]) -> Result<BrushList, PlacementError> {
    let mut cursor = Cursor::new(data);
    if read_bytes(&mut cursor, 3)? != BRUSH_MAGIC {
        return Err(PlacementError::InvalidSignature);
    }

    let _dw1 = read_i32(&mut cursor)?;
    let block_size = read_i32(&mut cursor)?;

    let title_count = read_count(&mut cursor, "title")?;
    for _ in 0..title_count {
        let len = read_i32(&mut cursor)?;
        if len < 4 {
            return Err(format_err(format!("title length {len} is shorter than its own header")));
        }
        skip(&mut cursor, i64::from(len) - 4)?;
    }

    let mesh_count = read_count(&mut cursor, "mesh")?;
    let mut meshes = Vec::with_capacity(mesh_count.min(4096));
    for _ in 0..mesh_count {
        skip(&mut cursor, 4)?;
        let raw = read_bytes(&mut cursor, MESH_NAME_LEN)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        meshes.push(sanitize_path(&String::from_utf8_lossy(&raw[..end])));
        skip(&mut cursor, 4)?;
        // bounding box
        skip(&mut cursor, 6 * 4)?;
    }

    let entry_count = read_count(&mut cursor, "brush")?;
    let mut entries = Vec::with_capacity(entry_count.min(65_536));
    for _ in 0..entry_count {
        skip(&mut cursor, 8)?;
        let mesh_index = read_i32(&mut cursor)?;
        skip(&mut cursor, 12)?;

        let mut matrix = [0.0f32; 12];
        for value in &mut matrix {
            *value = read_f32(&mut cursor)?;
        }

        for _ in 0..4 {
            read_u8(&mut cursor)?;
        }
        for _ in 0..3 {
            read_i32(&mut cursor)?;
        }

        let event = read_i32(&mut cursor)?;
        let event = u8::try_from(event)
            .map_err(|_| format_err(format!("event type {event} out of range")))?;

        read_i32(&mut cursor)?;
        if block_size > 16 {
            read_i32(&mut cursor)?;
        }
        skip(&mut cursor, 4 * (i64::from(block_size) - 17))?;

        let mesh_index = usize::try_from(mesh_index)
            .ok()
            .filter(|&i| i < meshes.len())
            .ok_or_else(|| {
                format_err(format!(
                    "mesh index {mesh_index} out of range ({} meshes)",
                    meshes.len()
                ))
            })?;

        entries.push(BrushEntry {
            mesh_index,
            matrix,
            event,
        });
    }

    Ok(BrushList { meshes, entries })
}

fn read_count(cursor: &mut crate::read::ByteCursor, what: &str) -> Result<usize, PlacementError> {
    let count = read_i32(cursor)?;
    usize::try_from(count).map_err(|_| format_err(format!("negative {what} count {count}")))
}

impl BrushList {
    pub fn mesh_name(&self, entry: &BrushEntry) -> &str {
        &self.meshes[entry.mesh_index]
    }

    /// Placements in file order
    pub fn placements(&self) -> Vec<Placement> {
        self.entries
            .iter()
            .map(|entry| {
                let m = &entry.matrix;
                Placement {
                    mesh: self.mesh_name(entry).to_string(),
                    position: entry.position(),
                    rotation: from_rows([[m[0], m[1], m[2]], [m[4], m[5], m[6]], [m[8], m[9], m[10]]]),
                    scale: Vec3::ONE,
                    kind: PlacementKind::Event,
                    field: u16::from(entry.event),
                    sub_level: 0,
                }
            })
            .collect()
    }

    /// Referenced meshes; those placed with an event mask are event meshes
    pub fn demand(&self) -> MeshDemand {
        let mut demand = MeshDemand::default();
        let mut seen = vec![false; self.meshes.len()];
        for entry in &self.entries {
            let name = self.mesh_name(entry);
            if !seen[entry.mesh_index] {
                seen[entry.mesh_index] = true;
                demand.required.push(name.to_string());
            }
            if entry.event > 0 && !demand.event.iter().any(|e| e == name) {
                demand.event.push(name.to_string());
            }
        }
        demand
    }
}
