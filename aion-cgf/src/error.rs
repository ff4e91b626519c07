//! Geometry decoding error types

use thiserror::Error;

/// Errors raised while decoding a geometry file
///
/// All of them are scoped to the one file being decoded.
#[derive(Debug, Error)]
pub enum CgfError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    /// A read ran past the end of the buffer
    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("invalid geometry magic")]
    InvalidMagic,

    /// Standalone animation files carry no geometry
    #[error("animation data files are not supported")]
    AnimationUnsupported,

    /// Structurally invalid content
    #[error("malformed geometry: {0}")]
    Format(String),
}

impl From<std::io::Error> for CgfError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CgfError::UnexpectedEof
        } else {
            CgfError::Io(e)
        }
    }
}

/// Shorthand for building a [`CgfError::Format`]
pub(crate) fn format_err(message: impl Into<String>) -> CgfError {
    CgfError::Format(message.into())
}
