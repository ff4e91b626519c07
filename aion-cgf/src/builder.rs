//! Geometry file writer
//!
//! Builds minimal but well-formed geometry files chunk by chunk. Every
//! method returns the chunk index that other chunks use to reference it.

use crate::*;

/// Node chunk fields
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    /// Chunk index of a mesh or helper
    pub object: i32,
    /// Chunk index of the parent node, -1 for top level
    pub parent: i32,
    /// Chunk index of the material, -1 for none
    pub material: i32,
    pub group_head: bool,
    /// Row-major affine transform
    pub transform: [f32; 16],
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    /// Position, rotation and scale controller chunk indices
    pub controllers: [i32; 3],
}

impl NodeSpec {
    /// Top-level node with identity transform and no material
    pub fn new(name: impl Into<String>, object: i32) -> Self {
        Self {
            name: name.into(),
            object,
            parent: -1,
            material: -1,
            group_head: false,
            transform: glam::Mat4::IDENTITY.to_cols_array(),
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            controllers: [-1; 3],
        }
    }
}

struct Chunk {
    kind: u32,
    /// Whether the body starts with the common 16-byte chunk header
    headed: bool,
    body: Vec<u8>,
}

#[derive(Default)]
pub struct CgfBuilder {
    chunks: Vec<Chunk>,
}

fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_fixed_str(out: &mut Vec<u8>, value: &str, len: usize) {
    let mut field = vec![0u8; len];
    let bytes = value.as_bytes();
    let n = bytes.len().min(len - 1);
    field[..n].copy_from_slice(&bytes[..n]);
    out.extend_from_slice(&field);
}

fn mesh_body(vertices: &[[f32; 3]], faces: &[([i32; 3], i32)]) -> Vec<u8> {
    let mut body = Vec::new();
    put_i32(&mut body, 0); // flags
    put_i32(&mut body, vertices.len() as i32);
    put_i32(&mut body, 0); // uv count
    put_i32(&mut body, faces.len() as i32);
    put_i32(&mut body, -1); // vertex animation
    for v in vertices {
        for &c in v {
            put_f32(&mut body, c);
        }
        for c in [0.0, 0.0, 1.0] {
            put_f32(&mut body, c);
        }
    }
    for (indices, slot) in faces {
        for &i in indices {
            put_i32(&mut body, i);
        }
        put_i32(&mut body, *slot);
        put_i32(&mut body, 0); // smoothing group
    }
    body
}

impl CgfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: u32, headed: bool, body: Vec<u8>) -> i32 {
        self.chunks.push(Chunk { kind, headed, body });
        self.chunks.len() as i32 - 1
    }

    fn next_index(&self) -> i32 {
        self.chunks.len() as i32
    }

    /// Material chunk; `kind` is 0 (unknown), 1 (single) or 2 (multi)
    pub fn material(&mut self, name: &str, kind: i32, collision: bool, children: &[i32]) -> i32 {
        let mut body = Vec::new();
        put_fixed_str(&mut body, name, 128);
        put_i32(&mut body, kind);
        put_i32(&mut body, if kind == 2 { children.len() as i32 } else { 0 });
        body.resize(body.len() + (67 * 4 + 128 + 263 * 4 + 128 + 204 * 4), 0);
        put_i32(&mut body, 0); // flags
        put_f32(&mut body, if collision { 1.0 } else { 0.0 });
        put_f32(&mut body, 0.0);
        put_f32(&mut body, 0.0);
        for &child in children {
            put_i32(&mut body, child);
        }
        self.push(CHUNK_MATERIAL, true, body)
    }

    /// Mesh chunk; vertices in source units, faces as (indices, slot)
    pub fn mesh(&mut self, vertices: &[[f32; 3]], faces: &[([i32; 3], i32)]) -> i32 {
        self.push(CHUNK_MESH, true, mesh_body(vertices, faces))
    }

    pub fn helper(&mut self, kind: i32, position: [f32; 3]) -> i32 {
        let mut body = Vec::new();
        put_i32(&mut body, kind);
        for c in position {
            put_f32(&mut body, c);
        }
        self.push(CHUNK_HELPER, true, body)
    }

    /// Node chunk; its chunk id is its own index
    pub fn node(&mut self, spec: &NodeSpec) -> i32 {
        let mut body = Vec::new();
        put_fixed_str(&mut body, &spec.name, 64);
        put_i32(&mut body, spec.object);
        put_i32(&mut body, spec.parent);
        put_i32(&mut body, 0); // child count
        put_i32(&mut body, spec.material);
        body.push(spec.group_head as u8);
        body.push(0);
        body.extend_from_slice(&[0, 0]);
        for &value in spec
            .transform
            .iter()
            .chain(&spec.position)
            .chain(&spec.rotation)
            .chain(&spec.scale)
        {
            put_f32(&mut body, value);
        }
        for &controller in &spec.controllers {
            put_i32(&mut body, controller);
        }
        self.push(CHUNK_NODE, true, body)
    }

    /// Controller chunk with keys of `(time, params)`
    ///
    /// Only the first eight parameters are written unless `kind` is TCBQ.
    pub fn controller(&mut self, kind: i32, keys: &[(i32, [f32; 9])]) -> i32 {
        let id = self.next_index();
        let mut body = Vec::new();
        put_i32(&mut body, kind);
        put_i32(&mut body, keys.len() as i32);
        put_i32(&mut body, 0); // flags
        put_i32(&mut body, id);
        let floats = if kind == CONTROLLER_TCBQ { 9 } else { 8 };
        for (time, params) in keys {
            put_i32(&mut body, *time);
            for &value in &params[..floats] {
                put_f32(&mut body, value);
            }
        }
        self.push(CHUNK_CONTROLLER, true, body)
    }

    pub fn bone_names(&mut self, names: &[&str]) -> i32 {
        let mut body = Vec::new();
        put_i32(&mut body, names.len() as i32);
        for name in names {
            body.extend_from_slice(name.as_bytes());
            body.push(0);
        }
        self.push(CHUNK_BONE_NAME_LIST, false, body)
    }

    /// Bind matrices: basis rows then translation in source units
    pub fn bone_initial(&mut self, matrices: &[[f32; 12]]) -> i32 {
        let mut body = Vec::new();
        put_i32(&mut body, -1); // mesh
        put_i32(&mut body, matrices.len() as i32);
        for matrix in matrices {
            for &value in matrix {
                put_f32(&mut body, value);
            }
        }
        self.push(CHUNK_BONE_INITIAL_POS, false, body)
    }

    pub fn bone_mesh(&mut self, vertices: &[[f32; 3]], faces: &[([i32; 3], i32)]) -> i32 {
        self.push(CHUNK_BONE_MESH, true, mesh_body(vertices, faces))
    }

    /// Bone animation chunk with `(id, parent, bone mesh chunk)` per bone
    pub fn bone_anim(&mut self, bones: &[(i32, i32, i32)]) -> i32 {
        let mut body = Vec::new();
        put_i32(&mut body, bones.len() as i32);
        for &(id, parent, mesh) in bones {
            put_i32(&mut body, id);
            put_i32(&mut body, parent);
            put_i32(&mut body, 0); // children
            put_i32(&mut body, 0); // name crc
            put_fixed_str(&mut body, "", 32);
            put_i32(&mut body, mesh);
            put_i32(&mut body, 0); // flags
            body.resize(body.len() + 96, 0);
        }
        self.push(CHUNK_BONE_ANIM, true, body)
    }

    /// Serialize with the given file type
    pub fn build_with_type(&self, file_type: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(CGF_MAGIC);
        out.extend_from_slice(&file_type.to_le_bytes());
        out.extend_from_slice(&0x0744u32.to_le_bytes());
        let table_offset_pos = out.len();
        out.extend_from_slice(&0u32.to_le_bytes());

        let mut offsets = Vec::with_capacity(self.chunks.len());
        for (index, chunk) in self.chunks.iter().enumerate() {
            let offset = out.len() as u32;
            offsets.push(offset);
            if chunk.headed {
                out.extend_from_slice(&chunk.kind.to_le_bytes());
                out.extend_from_slice(&0u32.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&(index as i32).to_le_bytes());
            }
            out.extend_from_slice(&chunk.body);
        }

        let table_offset = out.len() as u32;
        out[table_offset_pos..table_offset_pos + 4].copy_from_slice(&table_offset.to_le_bytes());
        out.extend_from_slice(&(self.chunks.len() as u32).to_le_bytes());
        for (index, chunk) in self.chunks.iter().enumerate() {
            out.extend_from_slice(&chunk.kind.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&offsets[index].to_le_bytes());
            out.extend_from_slice(&(index as i32).to_le_bytes());
        }
        out
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_type(FILE_TYPE_GEOMETRY)
    }
}
