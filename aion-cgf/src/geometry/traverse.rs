//! Collision batch extraction

use glam::{DMat4, Mat4, Vec3};
use hashbrown::HashMap;

use super::{Geometry, MeshData, NodePayload};
use crate::intention::{CollisionIntention, classify};
use crate::mesh::MeshRecord;
use crate::{HELPER_DUMMY, UNIT_SCALE};

impl Geometry {
    /// Extract the collision batches of the whole object
    ///
    /// Nodes are visited depth first; every emitting mesh node yields one
    /// record per distinct (material id, intention) pair in first-seen face
    /// order. Bone meshes follow as plain physical batches.
    pub fn traverse(&self) -> Vec<MeshRecord> {
        let mut out = Vec::new();
        self.traverse_nodes(&self.roots, Vec3::ZERO, Mat4::IDENTITY, &mut out);

        for bone in &self.bones {
            let m = &bone.matrix;
            #[rustfmt::skip]
            let matrix = Mat4::from_cols_array(&[
                m[0], m[1], m[2], 0.0,
                m[3], m[4], m[5], 0.0,
                m[6], m[7], m[8], 0.0,
                m[9] / UNIT_SCALE, m[10] / UNIT_SCALE, m[11] / UNIT_SCALE, 1.0,
            ]);
            if bone.mesh.vertices.is_empty() || bone.mesh.faces.is_empty() {
                continue;
            }
            out.push(MeshRecord {
                vertices: transform_vertices(&bone.mesh, &matrix.as_dmat4()),
                faces: bone.mesh.faces.iter().map(|f| f.indices).collect(),
                material_id: 0,
                intention: CollisionIntention::PHYSICAL,
            });
        }
        out
    }

    fn traverse_nodes(&self, indices: &[usize], origin: Vec3, parent: Mat4, out: &mut Vec<MeshRecord>) {
        for &index in indices {
            let node = &self.nodes[index];
            let mut local = node.position + origin;

            match &node.payload {
                NodePayload::Helper(helper) => {
                    if helper.kind != HELPER_DUMMY || node.children.is_empty() {
                        continue;
                    }
                    if node.group_head {
                        local /= node.scale;
                    }
                    let pivot = parent * node.matrix_with_translation(Vec3::ZERO);
                    self.traverse_nodes(&node.children, local, pivot, out);
                }
                NodePayload::Mesh(mesh) => {
                    if mesh.vertices.is_empty() || mesh.faces.is_empty() {
                        continue;
                    }
                    if !self.is_collideable(index) && self.semantic_id(index).is_none() {
                        continue;
                    }
                    let matrix = parent * node.matrix_with_translation(local / UNIT_SCALE);
                    self.emit_batches(mesh, &matrix.as_dmat4(), out);
                }
            }
        }
    }

    fn emit_batches(&self, mesh: &MeshData, matrix: &DMat4, out: &mut Vec<MeshRecord>) {
        let vertices = transform_vertices(mesh, matrix);
        let mut batches: Vec<MeshRecord> = Vec::new();
        let mut lookup: HashMap<(u8, CollisionIntention), usize> = HashMap::new();

        for face in &mesh.faces {
            let Some(material) = self.material(face.material) else {
                continue;
            };
            let Some((material_id, intention)) = classify(material.semantic_id, material.collideable)
            else {
                continue;
            };
            let batch = *lookup.entry((material_id, intention)).or_insert_with(|| {
                batches.push(MeshRecord {
                    vertices: vertices.clone(),
                    faces: Vec::new(),
                    material_id,
                    intention,
                });
                batches.len() - 1
            });
            batches[batch].faces.push(face.indices);
        }
        out.extend(batches);
    }
}

/// Row vector times matrix, evaluated in double precision
fn transform_vertices(mesh: &MeshData, matrix: &DMat4) -> Vec<Vec3> {
    mesh.vertices
        .iter()
        .map(|v| matrix.transform_point3(v.as_dvec3()).as_vec3())
        .collect()
}
