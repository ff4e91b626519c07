//! Archive error types

use thiserror::Error;

/// Errors raised while opening or unpacking a `.pak` archive
#[derive(Debug, Error)]
pub enum PakError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record did not start with the archive signature
    #[error("unknown record signature 0x{signature:04X} at offset {offset}")]
    UnknownSignature { signature: u16, offset: u64 },

    /// A record carried an unknown kind tag
    #[error("unknown record kind 0x{kind:04X} at offset {offset}")]
    UnknownRecord { kind: u16, offset: u64 },

    /// The archive ended before its end record, or continued after it
    #[error("malformed archive: {0}")]
    Format(String),

    /// An entry uses a compression method other than store or deflate
    #[error("entry {name}: unsupported compression method {method}")]
    UnsupportedMethod { name: String, method: u16 },

    /// None of the candidate keys decoded the probe entry
    #[error("no decryption key matches this archive")]
    KeyUnresolved,

    /// Declared and decoded size or checksum disagree
    #[error("entry {name}: {reason}")]
    IntegrityMismatch { name: String, reason: String },

    /// A key table is too short for its offset mask
    #[error("key table {name} has {len} bytes, needs at least {needed}")]
    InvalidKey {
        name: String,
        len: usize,
        needed: usize,
    },
}

impl PakError {
    /// Whether the error invalidates the whole archive rather than one entry
    ///
    /// A size or checksum mismatch means the key or the record offsets are
    /// wrong, so no other entry of the archive can be trusted either.
    pub fn is_fatal_for_archive(&self) -> bool {
        !matches!(self, PakError::UnsupportedMethod { .. })
    }
}
