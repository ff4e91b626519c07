//! Collision mesh records and their canonical form
//!
//! A decoded object yields one [`MeshRecord`] per (material, intention)
//! batch. Before storage every record is compacted and sorted, and the
//! records of one object are ordered by content, so structurally identical
//! geometry compares equal no matter how it was authored.

use std::cmp::Ordering;

use glam::Vec3;
use hashbrown::{HashMap, HashSet};

use crate::intention::CollisionIntention;

/// One triangle batch with a single material id and intention
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshRecord {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    pub material_id: u8,
    pub intention: CollisionIntention,
}

/// Hashable structural identity of a [`MeshRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshKey {
    pub vertices: Vec<[u32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub material_id: u8,
    pub intention: u8,
}

fn vertex_bits(v: Vec3) -> [u32; 3] {
    [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
}

fn cmp_vertex(a: &Vec3, b: &Vec3) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

impl MeshRecord {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Merge equal vertices and drop degenerate, duplicate and unused data
    ///
    /// Never increases the vertex or face count; running it twice changes
    /// nothing.
    pub fn compact(&mut self) {
        let mut unique: Vec<Vec3> = Vec::with_capacity(self.vertices.len());
        let mut lookup: HashMap<[u32; 3], u32> = HashMap::with_capacity(self.vertices.len());
        let remap: Vec<u32> = self
            .vertices
            .iter()
            .map(|&v| {
                // -0.0 + 0.0 == +0.0
                let v = v + Vec3::ZERO;
                *lookup.entry(vertex_bits(v)).or_insert_with(|| {
                    unique.push(v);
                    (unique.len() - 1) as u32
                })
            })
            .collect();

        let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(self.faces.len());
        let mut faces = Vec::with_capacity(self.faces.len());
        for face in &self.faces {
            let Some(mapped) = face
                .iter()
                .map(|&i| remap.get(i as usize).copied())
                .collect::<Option<Vec<u32>>>()
            else {
                continue;
            };
            let [a, b, c] = [mapped[0], mapped[1], mapped[2]];
            if a == b || b == c || a == c {
                continue;
            }
            let mut set = [a, b, c];
            set.sort_unstable();
            if seen.insert(set) {
                faces.push([a, b, c]);
            }
        }

        // reindex by first use
        let mut order = vec![u32::MAX; unique.len()];
        let mut vertices = Vec::with_capacity(unique.len());
        for face in &mut faces {
            for index in face.iter_mut() {
                let slot = &mut order[*index as usize];
                if *slot == u32::MAX {
                    *slot = vertices.len() as u32;
                    vertices.push(unique[*index as usize]);
                }
                *index = *slot;
            }
        }

        self.vertices = vertices;
        self.faces = faces;
    }

    /// Put vertices and faces into a total order
    ///
    /// Vertices are ordered by coordinates, each face's indices ascending,
    /// then the face list itself. Winding is not preserved.
    pub fn sort(&mut self) {
        let mut order: Vec<u32> = (0..self.vertices.len() as u32).collect();
        order.sort_by(|&a, &b| cmp_vertex(&self.vertices[a as usize], &self.vertices[b as usize]));

        let mut remap = vec![0u32; order.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old as usize] = new as u32;
        }
        self.vertices = order.iter().map(|&i| self.vertices[i as usize]).collect();

        for face in &mut self.faces {
            for index in face.iter_mut() {
                *index = remap[*index as usize];
            }
            face.sort_unstable();
        }
        self.faces.sort_unstable();
    }

    pub fn content_key(&self) -> MeshKey {
        MeshKey {
            vertices: self.vertices.iter().copied().map(vertex_bits).collect(),
            faces: self.faces.clone(),
            material_id: self.material_id,
            intention: self.intention.bits(),
        }
    }

    pub fn max_index(&self) -> u32 {
        self.faces.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// Bring a list of slots into canonical form
///
/// Every slot is compacted and sorted, empty slots are dropped, and the
/// remaining slots are ordered by content.
pub fn canonicalize(slots: &mut Vec<MeshRecord>) {
    for slot in slots.iter_mut() {
        slot.compact();
        slot.sort();
    }
    slots.retain(|slot| !slot.is_empty());
    slots.sort_by_cached_key(MeshRecord::content_key);
}

/// Identity of a canonical slot list
pub fn mesh_key(slots: &[MeshRecord]) -> Vec<MeshKey> {
    slots.iter().map(MeshRecord::content_key).collect()
}
