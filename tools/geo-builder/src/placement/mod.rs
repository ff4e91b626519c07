//! Level placement lists
//!
//! Each level pak carries up to four lists that place meshes in the world:
//!
//! - `brush.lst`: static brushes with full 3x4 transforms
//! - `objects.lst`: vegetation with quantized positions and angles
//! - `leveldata.xml`: heightmap metrics, the vegetation mesh list and the
//!   terrain surface materials
//! - `mission_mission0.xml`: entities (doors, placeables, towns, houses)
//!
//! Decoders return [`Placement`]s in file order and the mesh names they
//! reference, split into required and optional demand.

mod brush;
mod leveldata;
mod mission;
mod objects;

pub use brush::{BrushEntry, BrushList, decode_brush_list};
pub use leveldata::{LevelData, decode_level_data};
pub use mission::{HouseAddresses, MAX_TOWN_STAGE, decode_mission, parse_house_addresses, town_stage_mesh};
pub use objects::{ObjectEntry, decode_objects, object_placements};

use glam::{Mat3, Vec3};
use std::io;
use thiserror::Error;

/// Suffix of the opened-state mesh written for doors
pub const SECOND_STATE_SUFFIX: &str = "_state2";

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("{0}")]
    Format(String),
}

impl From<io::Error> for PlacementError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => PlacementError::UnexpectedEof,
            _ => PlacementError::Io(e),
        }
    }
}

pub(crate) fn format_err(message: impl Into<String>) -> PlacementError {
    PlacementError::Format(message.into())
}

/// Record kind stored with every placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlacementKind {
    None = 0,
    Event = 1,
    Placeable = 2,
    House = 3,
    HouseDoor = 4,
    Town = 5,
    Door = 6,
    Door2 = 7,
}

impl PlacementKind {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// One mesh instance in a level
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Sanitized mesh name
    ///
    /// For towns this is the stage 1 mesh; stages are resolved when the geo
    /// file is written.
    pub mesh: String,
    pub position: Vec3,
    /// Orientation mapping mesh space to world space (column vectors)
    pub rotation: Mat3,
    pub scale: Vec3,
    pub kind: PlacementKind,
    /// Entity id, event mask, house address or town id
    pub field: u16,
    /// Current stage for towns, 0 otherwise
    pub sub_level: u8,
}

/// Mesh names referenced by a level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDemand {
    pub required: Vec<String>,
    /// Names that may legitimately not exist
    pub optional: Vec<String>,
    /// Meshes whose slots all get the EVENT bit
    pub event: Vec<String>,
    /// Animated meshes that also need their opened state
    pub doors: Vec<String>,
}

impl MeshDemand {
    pub fn extend(&mut self, other: MeshDemand) {
        self.required.extend(other.required);
        self.optional.extend(other.optional);
        self.event.extend(other.event);
        self.doors.extend(other.doors);
    }

    /// Move every required name to the optional list
    pub fn make_optional(&mut self) {
        let required = std::mem::take(&mut self.required);
        self.optional.extend(required);
    }
}

/// Normalize a mesh path from a list or document
///
/// Trims, lower-cases, converts `\` to `/` and strips one trailing `.`.
pub fn sanitize_path(raw: &str) -> String {
    let path = raw.trim().to_lowercase().replace('\\', "/");
    match path.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => path,
    }
}

/// Matrix from rows given in reading order
pub(crate) fn from_rows(rows: [[f32; 3]; 3]) -> Mat3 {
    Mat3::from_cols_array_2d(&rows).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_keep_their_kind() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(PlacementError::from(eof), PlacementError::UnexpectedEof));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        match PlacementError::from(denied) {
            PlacementError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("  Objects\\Props\\Rock.CGF "), "objects/props/rock.cgf");
        assert_eq!(sanitize_path("levels/common/tree.cgf."), "levels/common/tree.cgf");
        assert_eq!(sanitize_path("a.cgf.."), "a.cgf.");
        assert_eq!(sanitize_path(""), "");
    }

    #[test]
    fn test_from_rows() {
        let m = from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(m.row(0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.col(0), Vec3::new(1.0, 4.0, 7.0));
    }

    #[test]
    fn test_demand_make_optional() {
        let mut demand = MeshDemand {
            required: vec!["a.cgf".into()],
            optional: vec!["b.cgf".into()],
            ..MeshDemand::default()
        };
        demand.make_optional();
        assert!(demand.required.is_empty());
        assert_eq!(demand.optional, ["b.cgf", "a.cgf"]);
    }
}
