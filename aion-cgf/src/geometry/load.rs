//! Chunk parsing

use std::io::Cursor;
use std::sync::Arc;

use glam::{Quat, Vec3};
use hashbrown::HashMap;

use super::{
    BoneEntity, ChunkHeader, Face, Geometry, GeometryNode, HelperData, Material, MaterialKind,
    MeshData, NodePayload, Track, TrackKey,
};
use crate::error::{CgfError, format_err};
use crate::material::MaterialTable;
use crate::read::*;
use crate::{
    CGF_MAGIC, CHUNK_BONE_ANIM, CHUNK_BONE_INITIAL_POS, CHUNK_BONE_MESH, CHUNK_BONE_NAME_LIST,
    CHUNK_CONTROLLER, CHUNK_HELPER, CHUNK_MATERIAL, CHUNK_MESH, CHUNK_NODE, CONTROLLER_BEZIER3,
    CONTROLLER_TCB3, CONTROLLER_TCBQ, FILE_TYPE_ANIMATION, FILE_TYPE_GEOMETRY, MAX_MATERIAL_DEPTH,
    UNIT_SCALE,
};

/// Material chunk bytes between the child count and the flags field
const MATERIAL_SHADER_BLOCK: u64 = 67 * 4 + 128 + 263 * 4 + 128 + 204 * 4;

/// Per-bone bytes after the flags: limits, spring data and frame matrix
const BONE_TRAILER: u64 = 5 * 3 * 4 + 3 * 3 * 4;

pub(super) fn load(data: &[u8], table: &MaterialTable) -> Result<Geometry, CgfError> {
    if data.len() < CGF_MAGIC.len() || &data[..CGF_MAGIC.len()] != CGF_MAGIC {
        return Err(CgfError::InvalidMagic);
    }

    let mut cursor = Cursor::new(data);
    skip(&mut cursor, CGF_MAGIC.len() as u64)?;
    match read_u32(&mut cursor)? {
        FILE_TYPE_GEOMETRY => {}
        FILE_TYPE_ANIMATION => return Err(CgfError::AnimationUnsupported),
        other => return Err(format_err(format!("unknown file type 0x{other:08X}"))),
    }
    let _version = read_u32(&mut cursor)?;
    let table_offset = read_u32(&mut cursor)?;

    seek_to(&mut cursor, table_offset)?;
    let count = read_count(&mut cursor, "chunk")?;
    ensure_remaining(&cursor, count, 16)?;
    let mut chunks = Vec::with_capacity(count);
    for _ in 0..count {
        chunks.push(ChunkHeader {
            kind: read_u32(&mut cursor)?,
            version: read_u32(&mut cursor)?,
            offset: read_u32(&mut cursor)?,
            id: read_i32(&mut cursor)?,
        });
    }

    let mut loader = Loader {
        data,
        chunks: &chunks,
        materials: vec![None; chunks.len()],
        meshes: HashMap::new(),
    };

    let mut slots = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        if chunk.kind == CHUNK_MATERIAL {
            let material = read_material(data, chunk, table)?;
            if material.kind != MaterialKind::Multi {
                slots.push(index);
            }
            loader.materials[index] = Some(material);
        }
    }
    resolve_materials(&mut loader.materials, table)?;

    let mut nodes = Vec::new();
    for chunk in chunks.iter().filter(|c| c.kind == CHUNK_NODE) {
        nodes.push(loader.read_node(chunk, &slots)?);
    }
    let roots = link_nodes(&mut nodes)?;
    let bones = loader.read_bones(&slots)?;

    Ok(Geometry {
        materials: loader.materials.into(),
        chunks: chunks.into(),
        slots: slots.into(),
        nodes,
        roots,
        bones,
    })
}

struct Loader<'a> {
    data: &'a [u8],
    chunks: &'a [ChunkHeader],
    materials: Vec<Option<Material>>,
    /// Mesh chunks shared by several nodes are decoded once
    meshes: HashMap<usize, Arc<MeshData>>,
}

impl<'a> Loader<'a> {
    fn chunk(&self, index: i32) -> Option<(usize, &'a ChunkHeader)> {
        let index = usize::try_from(index).ok()?;
        self.chunks.get(index).map(|c| (index, c))
    }

    fn read_node(&mut self, header: &ChunkHeader, slots: &[usize]) -> Result<GeometryNode, CgfError> {
        let mut cursor = cursor_at(self.data, header.offset)?;
        skip(&mut cursor, 12)?;
        let chunk_id = read_i32(&mut cursor)?;
        let name = read_fixed_str(&mut cursor, 64)?;
        let object = read_i32(&mut cursor)?;
        let parent_id = read_i32(&mut cursor)?;
        let _child_count = read_i32(&mut cursor)?;
        let material = read_i32(&mut cursor)?;
        let group_head = read_u8(&mut cursor)? != 0;
        let _group_member = read_u8(&mut cursor)?;
        skip(&mut cursor, 2)?;
        let transform = read_f32s::<16>(&mut cursor)?;
        let position = Vec3::from_array(read_f32s::<3>(&mut cursor)?);
        let [qx, qy, qz, qw] = read_f32s::<4>(&mut cursor)?;
        let scale = Vec3::from_array(read_f32s::<3>(&mut cursor)?);
        let position_controller = read_i32(&mut cursor)?;
        let rotation_controller = read_i32(&mut cursor)?;
        let scale_controller = read_i32(&mut cursor)?;

        let payload = match self.chunk(object) {
            Some((index, chunk)) if chunk.kind == CHUNK_MESH => {
                let offset = chunk.offset;
                let mesh = match self.meshes.get(&index) {
                    Some(mesh) => mesh.clone(),
                    None => {
                        let mesh = Arc::new(read_mesh(self.data, offset, slots, &self.materials)?);
                        self.meshes.insert(index, mesh.clone());
                        mesh
                    }
                };
                NodePayload::Mesh(mesh)
            }
            Some((_, chunk)) if chunk.kind == CHUNK_HELPER => {
                NodePayload::Helper(read_helper(self.data, chunk.offset)?)
            }
            _ => {
                return Err(format_err(format!(
                    "node '{name}' references chunk {object}, expected a mesh or helper"
                )));
            }
        };

        let material = match usize::try_from(material) {
            Ok(index) if self.materials.get(index).is_some_and(Option::is_some) => Some(index),
            Ok(index) => {
                tracing::debug!(node = %name, material = index, "node material is not a material chunk");
                None
            }
            Err(_) => None,
        };

        Ok(GeometryNode {
            chunk_id,
            name,
            parent_id,
            payload,
            material,
            group_head,
            transform,
            position,
            rotation: Quat::from_xyzw(qx, qy, qz, qw),
            scale,
            position_track: self.read_track(position_controller, false),
            rotation_track: self.read_track(rotation_controller, true),
            scale_track: self.read_track(scale_controller, false),
            children: Vec::new(),
        })
    }

    fn read_track(&self, controller: i32, rotation: bool) -> Option<Arc<Track>> {
        if controller == -1 {
            return None;
        }
        let track = match self.read_controller(controller, rotation) {
            Ok(keys) => Track::Keys(keys),
            Err(e) => Track::Invalid(format!("controller {controller}: {e}")),
        };
        Some(Arc::new(track))
    }

    fn read_controller(&self, controller: i32, rotation: bool) -> Result<Vec<TrackKey>, CgfError> {
        let Some((index, chunk)) = self.chunk(controller) else {
            return Err(format_err("index out of range"));
        };
        if chunk.kind != CHUNK_CONTROLLER {
            return Err(format_err(format!("chunk type 0x{:08X} is not a controller", chunk.kind)));
        }

        let mut cursor = cursor_at(self.data, chunk.offset)?;
        skip(&mut cursor, 16)?;
        let kind = read_i32(&mut cursor)?;
        let key_count = read_i32(&mut cursor)?;
        let _flags = read_i32(&mut cursor)?;
        let id = read_i32(&mut cursor)?;

        let accepted = if rotation {
            kind == CONTROLLER_TCBQ
        } else {
            kind == CONTROLLER_TCB3 || kind == CONTROLLER_BEZIER3
        };
        if !accepted {
            return Err(format_err(format!("unexpected controller type {kind}")));
        }
        if key_count < 1 {
            return Err(format_err(format!("unexpected key count {key_count}")));
        }
        if id != index as i32 {
            return Err(format_err(format!("controller id {id} does not match chunk {index}")));
        }

        let floats = if kind == CONTROLLER_TCBQ { 9 } else { 8 };
        let key_count = key_count as usize;
        ensure_remaining(&cursor, key_count, 4 + floats * 4)?;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let time = read_i32(&mut cursor)?;
            let mut params = [0f32; 9];
            for value in &mut params[..floats] {
                *value = read_f32(&mut cursor)?;
            }
            keys.push(TrackKey { time, params });
        }
        Ok(keys)
    }

    fn read_bones(&self, slots: &[usize]) -> Result<Vec<BoneEntity>, CgfError> {
        let mut names: Vec<String> = Vec::new();
        let mut initial: Vec<[f32; 12]> = Vec::new();
        let mut meshes: HashMap<i32, Arc<MeshData>> = HashMap::new();

        for chunk in self.chunks {
            match chunk.kind {
                CHUNK_BONE_NAME_LIST => names = read_bone_names(self.data, chunk.offset)?,
                CHUNK_BONE_INITIAL_POS => initial = read_bone_initial(self.data, chunk.offset)?,
                CHUNK_BONE_MESH => {
                    let mesh = read_mesh(self.data, chunk.offset, slots, &self.materials)?;
                    meshes.insert(chunk.id, Arc::new(mesh));
                }
                _ => {}
            }
        }

        let mut bones = Vec::new();
        for chunk in self.chunks.iter().filter(|c| c.kind == CHUNK_BONE_ANIM) {
            let mut cursor = cursor_at(self.data, chunk.offset)?;
            skip(&mut cursor, 16)?;
            let count = read_count(&mut cursor, "bone")?;
            ensure_remaining(&cursor, count, 4 * 4 + 32 + 4 * 2 + BONE_TRAILER as usize)?;

            for i in 0..count {
                let id = read_i32(&mut cursor)?;
                let parent_id = read_i32(&mut cursor)?;
                let _child_count = read_i32(&mut cursor)?;
                let _name_crc = read_i32(&mut cursor)?;
                let _name = read_fixed_str(&mut cursor, 32)?;
                let mesh_id = read_i32(&mut cursor)?;
                let _flags = read_i32(&mut cursor)?;
                skip(&mut cursor, BONE_TRAILER)?;

                let (Some(matrix), Some(mesh)) = (initial.get(i), meshes.get(&mesh_id)) else {
                    continue;
                };
                let name = names.get(i).cloned().unwrap_or_default();
                let lower = name.to_lowercase();
                if lower.contains("box") || lower.starts_with("fx") {
                    continue;
                }
                bones.push(BoneEntity {
                    id,
                    parent_id,
                    name,
                    matrix: *matrix,
                    mesh: mesh.clone(),
                });
            }
        }
        Ok(bones)
    }
}

/// Reduce a material chunk name to its dictionary key
///
/// `lib/mat/mat_lava\u{5}extra` becomes `mat_lava`.
pub(crate) fn semantic_name(raw: &str) -> String {
    let last = raw.rsplit('/').next().unwrap_or(raw);
    let cut = last.split('\u{5}').next().unwrap_or(last);
    cut.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn read_material(data: &[u8], header: &ChunkHeader, table: &MaterialTable) -> Result<Material, CgfError> {
    let mut cursor = cursor_at(data, header.offset)?;
    skip(&mut cursor, 16)?;
    let raw_name = read_fixed_str(&mut cursor, 128)?;
    let kind = MaterialKind::from_raw(read_i32(&mut cursor)?);
    let multi_count = read_i32(&mut cursor)?;
    skip(&mut cursor, MATERIAL_SHADER_BLOCK)?;
    let _flags = read_i32(&mut cursor)?;

    let collision = read_f32(&mut cursor)?;
    if collision != 0.0 && collision != 1.0 {
        return Err(format_err(format!(
            "material '{raw_name}': collision flag must be 0.0 or 1.0, found {collision}"
        )));
    }
    skip(&mut cursor, 8)?;

    let child_count = if kind == MaterialKind::Multi {
        multi_count.max(0) as usize
    } else {
        0
    };
    ensure_remaining(&cursor, child_count, 4)?;
    let children = (0..child_count)
        .map(|_| read_i32(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;

    let name = semantic_name(&raw_name);
    let id = table.id_of(&name);
    Ok(Material {
        name,
        kind,
        id,
        collision: collision == 1.0,
        children,
        collideable: false,
        semantic_id: None,
    })
}

/// Child material of a composite, `None` for empty (-1) entries
fn child_material(
    materials: &[Option<Material>],
    child: i32,
) -> Result<Option<(usize, &Material)>, CgfError> {
    if child == -1 {
        return Ok(None);
    }
    usize::try_from(child)
        .ok()
        .and_then(|i| materials.get(i).and_then(Option::as_ref).map(|m| (i, m)))
        .map(Some)
        .ok_or_else(|| format_err(format!("material child {child} is not a material chunk")))
}

fn check_depth(depth: usize) -> Result<(), CgfError> {
    if depth > MAX_MATERIAL_DEPTH {
        return Err(format_err("material nesting is cyclic or too deep"));
    }
    Ok(())
}

fn resolve_collideable(materials: &[Option<Material>], index: usize, depth: usize) -> Result<bool, CgfError> {
    check_depth(depth)?;
    let Some(material) = materials.get(index).and_then(Option::as_ref) else {
        return Ok(false);
    };
    if material.collision {
        return Ok(true);
    }
    for &child in &material.children {
        let Some((child_index, child)) = child_material(materials, child)? else {
            continue;
        };
        match child.kind {
            MaterialKind::Unknown => continue,
            MaterialKind::Multi => {
                if resolve_collideable(materials, child_index, depth + 1)? {
                    return Ok(true);
                }
            }
            MaterialKind::Single => {
                if child.collision {
                    return Ok(true);
                }
            }
            MaterialKind::Other(kind) => {
                return Err(format_err(format!("unhandled material type {kind}")));
            }
        }
    }
    Ok(false)
}

fn resolve_semantic(
    materials: &[Option<Material>],
    index: usize,
    depth: usize,
    table: &MaterialTable,
) -> Result<Option<u8>, CgfError> {
    check_depth(depth)?;
    let Some(material) = materials.get(index).and_then(Option::as_ref) else {
        return Ok(None);
    };
    if let Some(id) = table.semantic(material.id) {
        return Ok(Some(id));
    }
    for &child in &material.children {
        let Some((child_index, child)) = child_material(materials, child)? else {
            continue;
        };
        match child.kind {
            MaterialKind::Unknown => continue,
            MaterialKind::Multi => {
                if let Some(id) = resolve_semantic(materials, child_index, depth + 1, table)? {
                    return Ok(Some(id));
                }
            }
            MaterialKind::Single => {
                if let Some(id) = table.semantic(child.id) {
                    return Ok(Some(id));
                }
            }
            MaterialKind::Other(kind) => {
                return Err(format_err(format!("unhandled material type {kind}")));
            }
        }
    }
    Ok(None)
}

fn resolve_materials(materials: &mut [Option<Material>], table: &MaterialTable) -> Result<(), CgfError> {
    for index in 0..materials.len() {
        if materials[index].is_none() {
            continue;
        }
        let collideable = resolve_collideable(materials, index, 0)?;
        let semantic_id = resolve_semantic(materials, index, 0, table)?;
        if let Some(material) = materials[index].as_mut() {
            material.collideable = collideable;
            material.semantic_id = semantic_id;
        }
    }
    Ok(())
}

/// Mesh and bone mesh chunks share one layout
fn read_mesh(
    data: &[u8],
    offset: u32,
    slots: &[usize],
    materials: &[Option<Material>],
) -> Result<MeshData, CgfError> {
    let mut cursor = cursor_at(data, offset)?;
    skip(&mut cursor, 20)?;
    let vertex_count = read_count(&mut cursor, "vertex")?;
    skip(&mut cursor, 4)?;
    let face_count = read_count(&mut cursor, "face")?;
    skip(&mut cursor, 4)?;

    ensure_remaining(&cursor, vertex_count, 24)?;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        vertices.push(Vec3::from_array(read_f32s::<3>(&mut cursor)?) / UNIT_SCALE);
        skip(&mut cursor, 12)?;
    }

    ensure_remaining(&cursor, face_count, 20)?;
    let mut faces = Vec::new();
    for face_index in 0..face_count {
        let raw = [
            read_i32(&mut cursor)?,
            read_i32(&mut cursor)?,
            read_i32(&mut cursor)?,
        ];
        let slot = read_i32(&mut cursor)?;
        skip(&mut cursor, 4)?;

        let mut indices = [0u32; 3];
        for (out, &index) in indices.iter_mut().zip(&raw) {
            *out = u32::try_from(index)
                .ok()
                .filter(|&i| (i as usize) < vertex_count)
                .ok_or_else(|| format_err(format!("face {face_index}: vertex index {index} out of range")))?;
        }
        let material = usize::try_from(slot)
            .ok()
            .and_then(|s| slots.get(s).copied())
            .ok_or_else(|| format_err(format!("face {face_index}: material slot {slot} out of range")))?;

        let relevant = materials
            .get(material)
            .and_then(Option::as_ref)
            .is_some_and(Material::is_relevant);
        if relevant {
            faces.push(Face { indices, material });
        }
    }

    Ok(MeshData { vertices, faces })
}

fn read_helper(data: &[u8], offset: u32) -> Result<HelperData, CgfError> {
    let mut cursor = cursor_at(data, offset)?;
    skip(&mut cursor, 16)?;
    let kind = read_i32(&mut cursor)?;
    let position = Vec3::from_array(read_f32s::<3>(&mut cursor)?);
    Ok(HelperData { kind, position })
}

fn read_bone_names(data: &[u8], offset: u32) -> Result<Vec<String>, CgfError> {
    let mut cursor = cursor_at(data, offset)?;
    let count = read_count(&mut cursor, "bone name")?;
    ensure_remaining(&cursor, count, 1)?;
    let mut names = Vec::with_capacity(count);
    let mut current = Vec::new();
    while names.len() < count {
        match read_u8(&mut cursor)? {
            0 => {
                names.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
            }
            byte => current.push(byte),
        }
    }
    Ok(names)
}

fn read_bone_initial(data: &[u8], offset: u32) -> Result<Vec<[f32; 12]>, CgfError> {
    let mut cursor = cursor_at(data, offset)?;
    let _mesh = read_i32(&mut cursor)?;
    let count = read_count(&mut cursor, "bone")?;
    ensure_remaining(&cursor, count, 48)?;
    (0..count).map(|_| read_f32s::<12>(&mut cursor)).collect()
}

/// Attach every node to the first node carrying its parent id
///
/// Returns the top-level node indices. Nodes with an unknown parent are
/// left unattached.
fn link_nodes(nodes: &mut [GeometryNode]) -> Result<Vec<usize>, CgfError> {
    let mut roots = Vec::new();
    for index in 0..nodes.len() {
        let parent_id = nodes[index].parent_id;
        if parent_id == -1 {
            roots.push(index);
            continue;
        }
        if parent_id == nodes[index].chunk_id {
            return Err(format_err(format!(
                "node '{}' is its own parent",
                nodes[index].name
            )));
        }
        match nodes.iter().position(|n| n.chunk_id == parent_id) {
            Some(parent) => nodes[parent].children.push(index),
            None => tracing::debug!(
                node = %nodes[index].name,
                parent = parent_id,
                "dropping node with unknown parent"
            ),
        }
    }
    Ok(roots)
}
