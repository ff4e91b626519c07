//! In-memory archive writer
//!
//! Produces archives readable by [`PakArchive`](crate::PakArchive). Used to
//! build fixtures and to repack extracted files.

use std::io::Write;

use flate2::Compression as Level;
use flate2::write::DeflateEncoder;

use crate::key::DecryptKey;
use crate::{PAK_SIGNATURE, RECORD_DIR, RECORD_END, RECORD_FILE, crc32};

const VERSION: u8 = 20;

struct DirEntry {
    name: Vec<u8>,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    header_offset: u32,
}

pub struct PakWriter {
    key: DecryptKey,
    out: Vec<u8>,
    directory: Vec<DirEntry>,
}

impl PakWriter {
    pub fn new(key: DecryptKey) -> Self {
        Self {
            key,
            out: Vec::new(),
            directory: Vec::new(),
        }
    }

    /// Add an entry without compression
    pub fn add_stored(&mut self, name: &str, data: &[u8]) {
        self.push(name, 0, &[], data.to_vec(), data.len() as u32, crc32(data));
    }

    /// Add an uncompressed entry with an extra field in front of its body
    pub fn add_stored_with_extra(&mut self, name: &str, extra: &[u8], data: &[u8]) {
        self.push(name, 0, extra, data.to_vec(), data.len() as u32, crc32(data));
    }

    /// Add a raw-deflate entry
    pub fn add_deflated(&mut self, name: &str, data: &[u8]) -> std::io::Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Level::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;
        self.push(name, 8, &[], compressed, data.len() as u32, crc32(data));
        Ok(())
    }

    /// Add an entry with an arbitrary method id; the body is written as given
    pub fn add_with_method(&mut self, name: &str, method: u16, body: &[u8]) {
        self.push(name, method, &[], body.to_vec(), body.len() as u32, crc32(body));
    }

    fn push(
        &mut self,
        name: &str,
        method: u16,
        extra: &[u8],
        mut body: Vec<u8>,
        uncompressed_size: u32,
        crc: u32,
    ) {
        let header_offset = self.out.len() as u32;
        let compressed_size = body.len() as u32;
        self.key.apply(&mut body, compressed_size);

        let out = &mut self.out;
        out.extend_from_slice(&PAK_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&RECORD_FILE.to_le_bytes());
        out.push(VERSION);
        out.push(0);
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // time
        out.extend_from_slice(&0u16.to_le_bytes()); // date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&compressed_size.to_le_bytes());
        out.extend_from_slice(&uncompressed_size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(extra);
        out.extend_from_slice(&body);

        self.directory.push(DirEntry {
            name: name.as_bytes().to_vec(),
            method,
            crc32: crc,
            compressed_size,
            uncompressed_size,
            header_offset,
        });
    }

    /// Append the directory and end records and return the archive bytes
    pub fn finish(mut self) -> Vec<u8> {
        let dir_offset = self.out.len() as u32;
        let out = &mut self.out;
        for entry in &self.directory {
            out.extend_from_slice(&PAK_SIGNATURE.to_le_bytes());
            out.extend_from_slice(&RECORD_DIR.to_le_bytes());
            out.extend_from_slice(&[VERSION, 0, VERSION, 0]);
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // time, date
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&entry.compressed_size.to_le_bytes());
            out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra
            out.extend_from_slice(&0u16.to_le_bytes()); // comment
            out.extend_from_slice(&0u16.to_le_bytes()); // disk
            out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
            out.extend_from_slice(&0u32.to_le_bytes()); // external attributes
            out.extend_from_slice(&entry.header_offset.to_le_bytes());
            out.extend_from_slice(&entry.name);
        }
        let dir_size = out.len() as u32 - dir_offset;
        let count = self.directory.len() as u16;

        out.extend_from_slice(&PAK_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&RECORD_END.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&dir_size.to_le_bytes());
        out.extend_from_slice(&dir_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        self.out
    }
}
