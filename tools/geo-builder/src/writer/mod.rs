//! Binary output files
//!
//! - `geo.mesh`: every decoded mesh once, see [`MeshLibrary`]
//! - `<level id>.geo`: terrain plus placements, see [`write_geo`]
//!
//! Both formats are little endian and have no header; readers consume
//! records until end of file.

mod geo;
mod mesh_library;

pub use geo::{GeoStats, write_geo};
pub use mesh_library::{MAX_ELEMENTS, MAX_SLOTS, MeshLibrary, index_width, limit_violation};

use std::io::{self, Write};

/// File name of the mesh library
pub const MESH_LIBRARY_FILE: &str = "geo.mesh";

/// `u16` length followed by the bytes of `name`
fn write_name<W: Write>(w: &mut W, name: &str) -> io::Result<()> {
    let len = u16::try_from(name.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("name too long for a u16 length: {name}"),
        )
    })?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(name.as_bytes())
}

fn write_f32s<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}
