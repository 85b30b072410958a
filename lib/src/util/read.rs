use std::{
    borrow::Cow,
    io,
    io::{Cursor, Read},
};

use zerocopy::ByteOrder;

use crate::{
    error::{skip_inconsistent, LwoError, Result},
    format::FourCC,
};

#[inline(always)]
pub fn read_u8<R>(reader: &mut R) -> io::Result<u8>
where R: Read + ?Sized {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[inline(always)]
pub fn read_u16<O, R>(reader: &mut R) -> io::Result<u16>
where
    O: ByteOrder,
    R: Read + ?Sized,
{
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(O::read_u16(&buf))
}

#[inline(always)]
pub fn read_i16<O, R>(reader: &mut R) -> io::Result<i16>
where
    O: ByteOrder,
    R: Read + ?Sized,
{
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(O::read_i16(&buf))
}

#[inline(always)]
pub fn read_u32<O, R>(reader: &mut R) -> io::Result<u32>
where
    O: ByteOrder,
    R: Read + ?Sized,
{
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(O::read_u32(&buf))
}

#[inline(always)]
pub fn read_f32<O, R>(reader: &mut R) -> io::Result<f32>
where
    O: ByteOrder,
    R: Read + ?Sized,
{
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(O::read_f32(&buf))
}

#[inline(always)]
pub fn read_f32_array<O, R, const N: usize>(reader: &mut R) -> io::Result<[f32; N]>
where
    O: ByteOrder,
    R: Read + ?Sized,
{
    let mut out = [0f32; N];
    for v in &mut out {
        *v = read_f32::<O, R>(reader)?;
    }
    Ok(out)
}

#[inline(always)]
pub fn read_four_cc<R>(reader: &mut R) -> io::Result<FourCC>
where R: Read + ?Sized {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(FourCC(buf))
}

/// Reads a variable-width (VX) index: two bytes, or four bytes when the first is 0xFF.
#[inline]
pub fn read_vx<R>(reader: &mut R) -> io::Result<u32>
where R: Read + ?Sized {
    let first = read_u8(reader)?;
    if first != 0xFF {
        Ok(((first as u32) << 8) | read_u8(reader)? as u32)
    } else {
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf)?;
        Ok(((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | buf[2] as u32)
    }
}

/// Decodes a VX index at the start of `data`, returning the index and its encoded width.
pub fn decode_vx(data: &[u8]) -> Result<(u32, usize)> {
    match data {
        [0xFF, b1, b2, b3, ..] => {
            Ok((((*b1 as u32) << 16) | ((*b2 as u32) << 8) | *b3 as u32, 4))
        }
        [0xFF, ..] => Err(LwoError::truncated("VX index needs 4 bytes")),
        [b0, b1, ..] => Ok((((*b0 as u32) << 8) | *b1 as u32, 2)),
        _ => Err(LwoError::truncated("VX index needs 2 bytes")),
    }
}

/// Decodes a zero-terminated, even-padded string at the start of `data` without interpreting the
/// bytes. Returns the bytes before the terminator and the padded length.
pub fn decode_string_bytes(data: &[u8]) -> Result<(&[u8], usize)> {
    let Some(end) = data.iter().position(|&b| b == 0) else {
        return Err(LwoError::truncated("unterminated string"));
    };
    let len = end + 1;
    Ok((&data[..end], len + (len & 1)))
}

/// Decodes a zero-terminated, even-padded string at the start of `data`. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode_string(data: &[u8]) -> Result<(Cow<str>, usize)> {
    let (bytes, len) = decode_string_bytes(data)?;
    Ok((String::from_utf8_lossy(bytes), len))
}

/// Bytes left after the reader's current position.
#[inline]
pub fn remaining<'a>(reader: &Cursor<&'a [u8]>) -> &'a [u8] {
    let data = *reader.get_ref();
    &data[(reader.position() as usize).min(data.len())..]
}

#[inline]
pub fn at_end(reader: &Cursor<&[u8]>) -> bool { remaining(reader).is_empty() }

/// Advances past `len` bytes, clamping at the end of the buffer. A string's trailing pad byte may
/// be missing at the very end of a chunk.
#[inline]
fn advance(reader: &mut Cursor<&[u8]>, len: usize) {
    let end = reader.get_ref().len() as u64;
    reader.set_position((reader.position() + len as u64).min(end));
}

pub fn read_string(reader: &mut Cursor<&[u8]>) -> Result<String> {
    let (text, len) = decode_string(remaining(reader))?;
    let text = text.into_owned();
    advance(reader, len);
    Ok(text)
}

pub fn read_string_bytes(reader: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let (bytes, len) = decode_string_bytes(remaining(reader))?;
    let bytes = bytes.to_vec();
    advance(reader, len);
    Ok(bytes)
}

/// Decodes records until the reader is exhausted, appending them to `out`. Records referencing
/// out-of-range indices are dropped; any other error ends the walk, keeping what was decoded.
pub fn collect_records<'a, T, F>(
    reader: &mut Cursor<&'a [u8]>,
    out: &mut Vec<T>,
    mut decode: F,
) -> Result<()>
where
    F: FnMut(&mut Cursor<&'a [u8]>) -> Result<T>,
{
    while !at_end(reader) {
        if let Some(record) = skip_inconsistent(decode(reader))? {
            out.push(record);
        }
    }
    Ok(())
}
