//! Little-endian readers shared by the list and document decoders

use std::io::{self, Cursor, Read, Seek, SeekFrom};

pub(crate) type ByteCursor<'a> = Cursor<&'a [u8]>;

pub(crate) fn read_u8(cursor: &mut ByteCursor) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u16(cursor: &mut ByteCursor) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    cursor.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_i32(cursor: &mut ByteCursor) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_f32(cursor: &mut ByteCursor) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub(crate) fn read_bytes(cursor: &mut ByteCursor, len: usize) -> io::Result<Vec<u8>> {
    let remaining = remaining(cursor);
    if len > remaining {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("need {len} bytes, {remaining} left"),
        ));
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

/// Move relative to the current position, staying inside the buffer
pub(crate) fn skip(cursor: &mut ByteCursor, delta: i64) -> io::Result<()> {
    let target = cursor.position() as i64 + delta;
    if target < 0 || target as u64 > cursor.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("skip to {target} outside of {} bytes", cursor.get_ref().len()),
        ));
    }
    cursor.seek(SeekFrom::Start(target as u64))?;
    Ok(())
}

pub(crate) fn remaining(cursor: &ByteCursor) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}
