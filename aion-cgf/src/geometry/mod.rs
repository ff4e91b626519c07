//! Decoded geometry: node forest, materials, bones
//!
//! - `load` - chunk parsing and material resolution
//! - `traverse` - collision batch extraction
//! - `tests` - decoder and traversal tests over synthetic files

mod load;
mod traverse;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use crate::error::{CgfError, format_err};
use crate::material::MaterialTable;

/// Chunk table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub kind: u32,
    pub version: u32,
    pub offset: u32,
    pub id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Unknown,
    Single,
    Multi,
    Other(i32),
}

impl MaterialKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => MaterialKind::Unknown,
            1 => MaterialKind::Single,
            2 => MaterialKind::Multi,
            other => MaterialKind::Other(other),
        }
    }
}

/// A material chunk with its resolved collision properties
#[derive(Debug, Clone)]
pub struct Material {
    /// Semantic name looked up in the dictionary
    pub name: String,
    pub kind: MaterialKind,
    /// Dictionary id, -1 when the name is unknown
    pub id: i32,
    /// Collision flag of this chunk alone
    pub collision: bool,
    /// Child chunk indices of a composite, -1 entries mean none
    pub children: Vec<i32>,
    /// Own flag or any resolved child's
    pub collideable: bool,
    /// First intention id found on this material or below it
    pub semantic_id: Option<u8>,
}

impl Material {
    /// Whether faces using this material matter for collision at all
    pub fn is_relevant(&self) -> bool {
        self.collideable || self.semantic_id.is_some()
    }
}

/// A triangle and the material chunk of its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub indices: [u32; 3],
    pub material: usize,
}

/// Vertices in world units and the collision-relevant faces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelperData {
    pub kind: i32,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub enum NodePayload {
    Mesh(Arc<MeshData>),
    Helper(HelperData),
}

/// One animation key; the meaning of `params` depends on the track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackKey {
    pub time: i32,
    pub params: [f32; 9],
}

/// A controller's keys, or why they could not be read
///
/// Broken controllers only matter when a snapshot samples them.
#[derive(Debug, Clone, PartialEq)]
pub enum Track {
    Keys(Vec<TrackKey>),
    Invalid(String),
}

impl Track {
    /// Latest key at or before `tick`
    ///
    /// Keys are assumed to be in ascending time order.
    pub fn sample(&self, tick: i32) -> Result<Option<&TrackKey>, CgfError> {
        match self {
            Track::Keys(keys) => Ok(keys.iter().rev().find(|key| key.time <= tick)),
            Track::Invalid(reason) => Err(format_err(reason.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeometryNode {
    pub chunk_id: i32,
    pub name: String,
    pub parent_id: i32,
    pub payload: NodePayload,
    /// Material chunk index
    pub material: Option<usize>,
    pub group_head: bool,
    /// Row-major affine transform
    pub transform: [f32; 16],
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub position_track: Option<Arc<Track>>,
    pub rotation_track: Option<Arc<Track>>,
    pub scale_track: Option<Arc<Track>>,
    /// Node indices in chunk order
    pub children: Vec<usize>,
}

impl GeometryNode {
    /// Transform as a column-vector matrix with the given translation
    pub(crate) fn matrix_with_translation(&self, translation: Vec3) -> Mat4 {
        let mut cols = self.transform;
        cols[12] = translation.x;
        cols[13] = translation.y;
        cols[14] = translation.z;
        cols[15] = 1.0;
        Mat4::from_cols_array(&cols)
    }

    /// Rebuild the 3x3 part from rotation and scale, keeping the translation
    fn rebuild_basis(&mut self) {
        let current = Mat4::from_cols_array(&self.transform);
        let rotation = if self.rotation.length_squared() > 0.0 {
            self.rotation.normalize()
        } else {
            Quat::IDENTITY
        };
        let rebuilt = Mat4::from_scale_rotation_translation(
            self.scale,
            rotation,
            current.w_axis.truncate(),
        );
        self.transform = rebuilt.to_cols_array();
    }
}

/// A bone with its attached mesh and bind matrix
#[derive(Debug, Clone)]
pub struct BoneEntity {
    pub id: i32,
    pub parent_id: i32,
    pub name: String,
    /// Rows 0..2, 3..5, 6..8 form the basis; 9..11 the translation in source units
    pub matrix: [f32; 12],
    pub mesh: Arc<MeshData>,
}

/// A decoded geometry file
///
/// Immutable once loaded; [`Geometry::snapshot_at_tick`] returns an
/// independent copy.
#[derive(Debug, Clone)]
pub struct Geometry {
    chunks: Arc<[ChunkHeader]>,
    materials: Arc<[Option<Material>]>,
    slots: Arc<[usize]>,
    nodes: Vec<GeometryNode>,
    roots: Vec<usize>,
    bones: Vec<BoneEntity>,
}

impl Geometry {
    /// Decode a geometry buffer
    pub fn load(data: &[u8], table: &MaterialTable) -> Result<Self, CgfError> {
        load::load(data, table)
    }

    pub fn chunks(&self) -> &[ChunkHeader] {
        &self.chunks
    }

    /// Material by chunk index
    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index).and_then(Option::as_ref)
    }

    pub fn materials(&self) -> impl Iterator<Item = (usize, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (i, m)))
    }

    /// Material chunk indices addressed by face slot numbers
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn nodes(&self) -> &[GeometryNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn bones(&self) -> &[BoneEntity] {
        &self.bones
    }

    /// Whether a node blocks movement
    ///
    /// A node without material is collideable only as a group head with a
    /// collideable child.
    pub fn is_collideable(&self, index: usize) -> bool {
        let Some(node) = self.nodes.get(index) else {
            return false;
        };
        match node.material.and_then(|m| self.material(m)) {
            Some(material) => material.collideable,
            None => {
                node.group_head && node.children.iter().any(|&child| self.is_collideable(child))
            }
        }
    }

    pub fn semantic_id(&self, index: usize) -> Option<u8> {
        let node = self.nodes.get(index)?;
        node.material
            .and_then(|m| self.material(m))
            .and_then(|m| m.semantic_id)
    }

    /// Copy of this geometry posed at an animation tick
    ///
    /// Each track of every collideable top-level node takes its latest key at
    /// or before `tick`. Position and scale are replaced, rotation becomes
    /// the key's axis-angle quaternion.
    pub fn snapshot_at_tick(&self, tick: i32) -> Result<Geometry, CgfError> {
        let mut posed = self.clone();
        for &root in &self.roots {
            if !self.is_collideable(root) {
                continue;
            }
            let node = &mut posed.nodes[root];
            let mut basis_changed = false;

            if let Some(track) = node.position_track.clone()
                && let Some(key) = track.sample(tick)?
            {
                node.position = Vec3::new(key.params[0], key.params[1], key.params[2]);
            }
            if let Some(track) = node.rotation_track.clone()
                && let Some(key) = track.sample(tick)?
            {
                node.rotation = axis_angle(key);
                basis_changed = true;
            }
            if let Some(track) = node.scale_track.clone()
                && let Some(key) = track.sample(tick)?
            {
                node.scale = Vec3::new(key.params[0], key.params[1], key.params[2]);
                basis_changed = true;
            }

            if basis_changed {
                node.rebuild_basis();
            }
        }
        Ok(posed)
    }
}

/// Quaternion from an (x, y, z, angle) key
fn axis_angle(key: &TrackKey) -> Quat {
    let half = key.params[3] * 0.5;
    let s = half.sin();
    Quat::from_xyzw(
        key.params[0] * s,
        key.params[1] * s,
        key.params[2] * s,
        half.cos(),
    )
}
