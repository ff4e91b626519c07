//! aion-pak: reader for the Aion client's encrypted `.pak` archives
//!
//! A `.pak` file is a ZIP-like container with scrambled record signatures and
//! an XOR-encrypted head on every file body. The first 32 bytes of each body
//! are XOR-ed against one of a small set of key tables, at an offset derived
//! from the body size. Which table a client build uses is not recorded in the
//! archive, so it is detected by trial-decoding the first file entry and
//! matching its declared CRC32.
//!
//! # Record Layout
//!
//! Records follow each other from offset 0 until an end record:
//!
//! ```text
//! u16 signature (0xB4AF)
//! u16 kind      (FILE 0xFBFD | DIR 0xF1F2 | END 0xF5F6)
//! ...           fixed header for the kind, then name and body
//! ```
//!
//! File records carry their own name and sizes, so the trailing central
//! directory is parsed only to be skipped.
//!
//! # Usage
//!
//! ```ignore
//! use aion_pak::{DecryptKey, PakArchive};
//!
//! let keys = vec![DecryptKey::from_file("keys/table2.bin", 0x3FF)?];
//! let pak = PakArchive::open("Levels/common/Mesh_Meshes_000.pak", &keys)?;
//! for name in pak.names() {
//!     println!("{name}");
//! }
//! let bytes = pak.unpack("levels/common/rock.cgf")?;
//! ```

mod archive;
mod error;
mod key;
mod read;
mod record;
mod writer;

pub use archive::{PakArchive, PakEntry, archive_prefix};
pub use error::PakError;
pub use key::DecryptKey;
pub use record::Compression;
pub use writer::PakWriter;

// =============================================================================
// Constants
// =============================================================================

/// Leading signature shared by every record
pub const PAK_SIGNATURE: u16 = 0xB4AF;

/// Record kind: local file header followed by its body
pub const RECORD_FILE: u16 = 0xFBFD;

/// Record kind: central directory entry
pub const RECORD_DIR: u16 = 0xF1F2;

/// Record kind: end of archive
pub const RECORD_END: u16 = 0xF5F6;

/// Number of body bytes covered by the XOR key
pub const ENCRYPTED_HEAD_LEN: usize = 32;

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Normalize an entry name: trim, lower-case, forward slashes
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('\\', "/")
}

/// CRC-32 (ISO-HDLC) as stored in file records
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
