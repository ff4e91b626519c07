//! Fixed-layout record headers

use std::io::Read;

use crate::read::{read_bytes, read_u8, read_u16, read_u32};

/// Body compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Stored as-is (method 0)
    Store,
    /// Raw deflate stream without zlib header (method 8)
    Deflate,
    /// Any other method id; entries using it cannot be unpacked
    Unsupported(u16),
}

impl Compression {
    pub fn from_method(method: u16) -> Self {
        match method {
            0 => Compression::Store,
            8 => Compression::Deflate,
            other => Compression::Unsupported(other),
        }
    }

    pub fn method(self) -> u16 {
        match self {
            Compression::Store => 0,
            Compression::Deflate => 8,
            Compression::Unsupported(m) => m,
        }
    }
}

/// Local file header (26 bytes + name)
#[derive(Debug, Clone)]
pub(crate) struct FileHeader {
    pub compression: Compression,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub extra_len: u16,
    pub name: Vec<u8>,
}

impl FileHeader {
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let _extract_version = read_u8(reader)?;
        let _extract_system = read_u8(reader)?;
        let _flags = read_u16(reader)?;
        let method = read_u16(reader)?;
        let _time = read_u16(reader)?;
        let _date = read_u16(reader)?;
        let crc32 = read_u32(reader)?;
        let compressed_size = read_u32(reader)?;
        let uncompressed_size = read_u32(reader)?;
        let name_len = read_u16(reader)?;
        let extra_len = read_u16(reader)?;
        let name = read_bytes(reader, name_len as usize)?;
        Ok(Self {
            compression: Compression::from_method(method),
            crc32,
            compressed_size,
            uncompressed_size,
            extra_len,
            name,
        })
    }

    /// Bytes following the header: extra field, then compressed data
    pub fn body_size(&self) -> u64 {
        self.extra_len as u64 + self.compressed_size as u64
    }
}

/// Central directory header (42 bytes + name); only its size matters here
#[derive(Debug, Clone)]
pub(crate) struct DirHeader {
    pub extra_len: u16,
    pub comment_len: u16,
}

impl DirHeader {
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        // create/extract version and system bytes
        read_bytes(reader, 4)?;
        // flags, method, time, date
        read_bytes(reader, 8)?;
        // crc, compressed, uncompressed
        read_bytes(reader, 12)?;
        let name_len = read_u16(reader)?;
        let extra_len = read_u16(reader)?;
        let comment_len = read_u16(reader)?;
        let _disk = read_u16(reader)?;
        let _internal_attr = read_u16(reader)?;
        let _external_attr = read_u32(reader)?;
        let _local_header_offset = read_u32(reader)?;
        read_bytes(reader, name_len as usize)?;
        Ok(Self {
            extra_len,
            comment_len,
        })
    }

    pub fn body_size(&self) -> u64 {
        self.extra_len as u64 + self.comment_len as u64
    }
}

/// End-of-archive record (18 bytes)
#[derive(Debug, Clone)]
pub(crate) struct EndHeader {
    pub total_count: u16,
}

impl EndHeader {
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let _disk = read_u16(reader)?;
        let _first_disk = read_u16(reader)?;
        let _this_count = read_u16(reader)?;
        let total_count = read_u16(reader)?;
        let _dir_size = read_u32(reader)?;
        let _dir_offset = read_u32(reader)?;
        let _comment_len = read_u16(reader)?;
        Ok(Self { total_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_method() {
        assert_eq!(Compression::from_method(0), Compression::Store);
        assert_eq!(Compression::from_method(8), Compression::Deflate);
        assert_eq!(Compression::from_method(12), Compression::Unsupported(12));
        assert_eq!(Compression::Unsupported(12).method(), 12);
    }

    #[test]
    fn test_file_header_read() {
        let mut data = vec![20, 0, 0, 0, 8, 0, 0, 0, 0, 0];
        data.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        data.extend_from_slice(&10u32.to_le_bytes());
        data.extend_from_slice(&30u32.to_le_bytes());
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(b"a.cgf");

        let header = FileHeader::read(&mut &data[..]).unwrap();
        assert_eq!(header.compression, Compression::Deflate);
        assert_eq!(header.crc32, 0xDEADBEEF);
        assert_eq!(header.compressed_size, 10);
        assert_eq!(header.uncompressed_size, 30);
        assert_eq!(header.name, b"a.cgf");
        assert_eq!(header.body_size(), 12);
    }
}
