//! aion-cgf: collision geometry from Aion client CGF/CGA files
//!
//! This crate decodes the chunked geometry format used by the client's static
//! and animated objects, extracts the triangle batches that matter for
//! server-side collision, and canonicalizes them so identical geometry shipped
//! under different names can be stored once.
//!
//! # Format Overview
//!
//! A geometry file is a header followed by chunks located through a table:
//!
//! ```text
//! "NCAion\0\0"    magic
//! u32 file type   (0xFFFF0000 geometry, 0xFFFF0001 animation)
//! u32 version
//! u32 table offset
//! ...
//! table: u32 count, count x (u32 type, u32 version, u32 offset, i32 id)
//! ```
//!
//! Nodes form a forest. Mesh nodes carry vertices and faces; dummy helper
//! nodes group children under a shared pivot. Materials are leaves or
//! composites of other materials and decide which faces are collideable and
//! which carry a semantic id (lava, abyss shields, ...).
//!
//! # Usage
//!
//! ```ignore
//! use aion_cgf::{Geometry, MaterialTable, canonicalize};
//!
//! let table = MaterialTable::builtin();
//! let geometry = Geometry::load(&bytes, &table)?;
//! let mut slots = geometry.traverse();
//! canonicalize(&mut slots);
//!
//! // opened state of a door
//! let opened = geometry.snapshot_at_tick(999_999)?.traverse();
//! ```

mod builder;
mod error;
mod geometry;
mod intention;
mod material;
mod mesh;
mod read;

pub use builder::{CgfBuilder, NodeSpec};
pub use error::CgfError;
pub use geometry::{
    BoneEntity, ChunkHeader, Face, Geometry, GeometryNode, HelperData, Material, MaterialKind, MeshData,
    NodePayload, Track, TrackKey,
};
pub use intention::{CollisionIntention, classify};
pub use material::MaterialTable;
pub use mesh::{MeshKey, MeshRecord, canonicalize, mesh_key};

// =============================================================================
// Constants
// =============================================================================

/// File magic
pub const CGF_MAGIC: &[u8; 8] = b"NCAion\0\0";

/// File type of static and animated geometry
pub const FILE_TYPE_GEOMETRY: u32 = 0xFFFF_0000;

/// File type of standalone animation data (not supported)
pub const FILE_TYPE_ANIMATION: u32 = 0xFFFF_0001;

pub const CHUNK_MESH: u32 = 0xCCCC_0000;
pub const CHUNK_HELPER: u32 = 0xCCCC_0001;
pub const CHUNK_BONE_ANIM: u32 = 0xCCCC_0003;
pub const CHUNK_BONE_NAME_LIST: u32 = 0xCCCC_0005;
pub const CHUNK_NODE: u32 = 0xCCCC_000B;
pub const CHUNK_MATERIAL: u32 = 0xCCCC_000C;
pub const CHUNK_CONTROLLER: u32 = 0xCCCC_000D;
pub const CHUNK_BONE_MESH: u32 = 0xCCCC_000F;
pub const CHUNK_BONE_INITIAL_POS: u32 = 0xCCCC_0012;

/// Helper kind marking a dummy pivot
pub const HELPER_DUMMY: i32 = 1;

/// Controller key layouts
pub const CONTROLLER_BEZIER3: i32 = 6;
pub const CONTROLLER_TCB3: i32 = 9;
pub const CONTROLLER_TCBQ: i32 = 10;

/// Deepest allowed nesting of composite materials
pub const MAX_MATERIAL_DEPTH: usize = 16;

/// Source units per world unit
pub const UNIT_SCALE: f32 = 100.0;

/// Tick sampled for the opened state of doors
pub const DEFAULT_SECOND_STATE_TICK: i32 = 999_999;
