//! XOR key tables used to scramble file body heads

use std::path::Path;
use std::sync::Arc;

use crate::ENCRYPTED_HEAD_LEN;
use crate::error::PakError;

/// One candidate decryption key
///
/// The table is indexed starting at `body_size & offset_mask`, so it must be
/// at least `offset_mask + 32` bytes long.
#[derive(Debug, Clone)]
pub struct DecryptKey {
    name: String,
    table: Arc<[u8]>,
    offset_mask: u32,
}

impl DecryptKey {
    /// Build a key from an in-memory table
    pub fn new(name: impl Into<String>, table: Vec<u8>, offset_mask: u32) -> Result<Self, PakError> {
        let name = name.into();
        let needed = offset_mask as usize + ENCRYPTED_HEAD_LEN;
        if table.len() < needed {
            return Err(PakError::InvalidKey {
                name,
                len: table.len(),
                needed,
            });
        }
        Ok(Self {
            name,
            table: table.into(),
            offset_mask,
        })
    }

    /// Load a key table from a raw binary file
    pub fn from_file(path: impl AsRef<Path>, offset_mask: u32) -> Result<Self, PakError> {
        let path = path.as_ref();
        let table = std::fs::read(path)?;
        Self::new(path.display().to_string(), table, offset_mask)
    }

    /// Display name (the table's source path for file-backed keys)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table offset for a body of the given compressed size
    pub fn offset(&self, body_size: u32) -> usize {
        (body_size & self.offset_mask) as usize
    }

    /// XOR the encrypted head of a body in place
    ///
    /// Only the first `min(32, head.len())` bytes are touched. The operation
    /// is its own inverse.
    pub fn apply(&self, head: &mut [u8], body_size: u32) {
        let offset = self.offset(body_size);
        let len = head.len().min(ENCRYPTED_HEAD_LEN);
        for (byte, k) in head[..len].iter_mut().zip(&self.table[offset..offset + len]) {
            *byte ^= k;
        }
    }
}
