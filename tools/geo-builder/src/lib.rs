//! geo-builder library
//!
//! Turns an installed Aion client into server collision data: a shared mesh
//! library (`geo.mesh`) plus one placement file per level (`<id>.geo`).
//!
//! The pieces are usable on their own (the binary's `inspect`, `list` and
//! `extract` commands use them directly), while [`build::GeoBuilder`] runs
//! the whole pipeline.

pub mod build;
pub mod config;
pub mod demand;
pub mod images;
pub mod placement;
pub mod report;
pub mod terrain;
pub mod writer;
pub mod xml;

mod read;

pub use build::{BuildOptions, BuildStage, GeoBuilder};
pub use config::GeoConfig;
pub use demand::{DemandSet, Remaining};
pub use placement::{Placement, PlacementError, PlacementKind};
pub use report::BuildReport;
pub use xml::{XmlError, XmlNode};
