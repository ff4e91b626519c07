//! Little-endian cursor helpers

use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{CgfError, format_err};

pub(crate) type ChunkCursor<'a> = Cursor<&'a [u8]>;

pub(crate) fn read_u8(cursor: &mut ChunkCursor) -> Result<u8, CgfError> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u32(cursor: &mut ChunkCursor) -> Result<u32, CgfError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_i32(cursor: &mut ChunkCursor) -> Result<i32, CgfError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_f32(cursor: &mut ChunkCursor) -> Result<f32, CgfError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub(crate) fn read_f32s<const N: usize>(cursor: &mut ChunkCursor) -> Result<[f32; N], CgfError> {
    let mut out = [0f32; N];
    for value in &mut out {
        *value = read_f32(cursor)?;
    }
    Ok(out)
}

/// Read a count field, rejecting negative values
pub(crate) fn read_count(cursor: &mut ChunkCursor, what: &str) -> Result<usize, CgfError> {
    let count = read_i32(cursor)?;
    usize::try_from(count).map_err(|_| format_err(format!("negative {what} count {count}")))
}

/// Read a fixed-size, NUL-padded string field
pub(crate) fn read_fixed_str(cursor: &mut ChunkCursor, len: usize) -> Result<String, CgfError> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&buf[..end]).trim().to_string())
}

pub(crate) fn skip(cursor: &mut ChunkCursor, len: u64) -> Result<(), CgfError> {
    let target = cursor.position() + len;
    if target > cursor.get_ref().len() as u64 {
        return Err(CgfError::UnexpectedEof);
    }
    cursor.set_position(target);
    Ok(())
}

pub(crate) fn seek_to(cursor: &mut ChunkCursor, offset: u32) -> Result<(), CgfError> {
    if offset as usize > cursor.get_ref().len() {
        return Err(CgfError::UnexpectedEof);
    }
    cursor.seek(SeekFrom::Start(offset as u64))?;
    Ok(())
}

/// Fail early when `count` records of `stride` bytes cannot fit
pub(crate) fn ensure_remaining(
    cursor: &ChunkCursor,
    count: usize,
    stride: usize,
) -> Result<(), CgfError> {
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if count.checked_mul(stride).is_none_or(|needed| needed > remaining) {
        return Err(CgfError::UnexpectedEof);
    }
    Ok(())
}

/// Fresh cursor positioned at a chunk offset
pub(crate) fn cursor_at(data: &[u8], offset: u32) -> Result<ChunkCursor<'_>, CgfError> {
    let mut cursor = Cursor::new(data);
    seek_to(&mut cursor, offset)?;
    Ok(cursor)
}
