//! geo.mesh writer and cross-name deduplication

use super::{write_f32s, write_name};
use aion_cgf::{MeshKey, MeshRecord, mesh_key};
use anyhow::Result;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;
use std::io::Write;

/// Most slots one mesh may have
pub const MAX_SLOTS: usize = 255;

/// Most vertices or faces one slot may have
pub const MAX_ELEMENTS: usize = 65_535;

/// Separator between names sharing one stored mesh
const KEY_SEPARATOR: &str = "|";

/// Bytes per written vertex index: 2 when any index exceeds 255
pub fn index_width(slot: &MeshRecord) -> u8 {
    if slot.max_index() > u32::from(u8::MAX) { 2 } else { 1 }
}

/// Why a mesh cannot be stored, if it cannot
pub fn limit_violation(slots: &[MeshRecord]) -> Option<String> {
    if slots.len() > MAX_SLOTS {
        return Some(format!("{} slots (max {MAX_SLOTS})", slots.len()));
    }
    slots.iter().enumerate().find_map(|(i, slot)| {
        if slot.vertices.len() > MAX_ELEMENTS {
            Some(format!("slot {i} has {} vertices (max {MAX_ELEMENTS})", slot.vertices.len()))
        } else if slot.faces.len() > MAX_ELEMENTS {
            Some(format!("slot {i} has {} faces (max {MAX_ELEMENTS})", slot.faces.len()))
        } else {
            None
        }
    })
}

/// Canonical meshes keyed by the names that share them
#[derive(Debug, Default)]
pub struct MeshLibrary {
    /// Key is the sorted names joined by `|`
    entries: BTreeMap<String, Vec<MeshRecord>>,
    names: HashSet<String>,
}

impl MeshLibrary {
    /// Group canonical meshes with identical content under one key
    pub fn from_meshes(meshes: impl IntoIterator<Item = (String, Vec<MeshRecord>)>) -> Self {
        let mut groups: HashMap<Vec<MeshKey>, (Vec<String>, Vec<MeshRecord>)> = HashMap::new();
        for (name, slots) in meshes {
            groups
                .entry(mesh_key(&slots))
                .or_insert_with(|| (Vec::new(), slots))
                .0
                .push(name);
        }

        let mut library = MeshLibrary::default();
        for (_, (mut names, slots)) in groups {
            names.sort_unstable();
            names.dedup();
            library.names.extend(names.iter().cloned());
            library.entries.insert(names.join(KEY_SEPARATOR), slots);
        }
        library
    }

    /// Whether `name` is stored (alone or as part of a shared key)
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of names across all records
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MeshRecord])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Write all records in ascending key order
    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        for (key, slots) in &self.entries {
            write_name(w, key)?;
            w.write_all(&[u8::try_from(slots.len())?])?;
            for slot in slots {
                write_slot(w, slot)?;
            }
        }
        Ok(())
    }
}

fn write_slot<W: Write>(w: &mut W, slot: &MeshRecord) -> Result<()> {
    w.write_all(&u16::try_from(slot.vertices.len())?.to_le_bytes())?;
    for v in &slot.vertices {
        write_f32s(w, &v.to_array())?;
    }

    w.write_all(&u16::try_from(slot.faces.len())?.to_le_bytes())?;
    let width = index_width(slot);
    w.write_all(&[width])?;
    for &index in slot.faces.iter().flatten() {
        if width == 1 {
            w.write_all(&[index as u8])?;
        } else {
            w.write_all(&(index as u16).to_le_bytes())?;
        }
    }

    w.write_all(&[slot.material_id, slot.intention.bits()])?;
    Ok(())
}
