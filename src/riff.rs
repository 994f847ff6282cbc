//! RIFF container primitives shared by the SF2 and DLS codecs.
//!
//! Reading walks `fourCC + u32 size + payload` chunks over a byte slice with
//! nom, writing builds chunks into `Vec<u8>` buffers so that sizes are always
//! computed from the actual payload.

use crate::{nom_context, ParseResult};
use binrw::{BinRead, BinWrite};
use nom::{
    bytes::complete::{tag, take},
    number::complete::le_u32,
};
use std::io::Cursor;

pub type FourCC = [u8; 4];

pub const RIFF: &FourCC = b"RIFF";
pub const LIST: &FourCC = b"LIST";

#[inline]
pub(crate) fn align<const N: usize>(v: usize) -> usize {
    (v + (N - 1)) & !(N - 1)
}

/// Checks the `RIFF` header and form type, returning the form payload.
#[inline]
pub fn parse_riff_header<'a>(data: &'a [u8], name: &FourCC) -> ParseResult<'a> {
    let (data, _) = tag(RIFF)(data).map_err(|_: nom::Err<()>| nom_context(data, "RIFF header"))?;
    let (data, riffsize) = le_u32(data)?;
    // truncated files keep whatever payload is actually there
    let data = data.get(..riffsize as usize).unwrap_or(data);
    let (data, _) = tag_ignore_case(data, name)?;
    Ok((data, ()))
}

#[inline]
fn tag_ignore_case<'a>(data: &'a [u8], name: &FourCC) -> ParseResult<'a, &'a [u8]> {
    let (rest, id) = take(4usize)(data)?;
    if id.eq_ignore_ascii_case(name) {
        Ok((rest, id))
    } else {
        Err(nom_context(data, "RIFF form type"))
    }
}

/// Calls `f` with the id and payload of every chunk in `data`.
///
/// Odd-sized payloads are followed by a pad byte that is skipped. A chunk
/// whose id is all zero bytes is treated as empty, since its size field
/// cannot be trusted either.
#[inline]
pub fn parse_riff_chunks<'a>(
    mut data: &'a [u8],
    mut f: impl FnMut(FourCC, &'a [u8]) -> ParseResult<'a>,
) -> ParseResult<'a> {
    while data.len() >= 8 {
        let (d, chunk_name) = take(4usize)(data)?;
        let (d, mut chunk_size) = le_u32(d)?;
        let chunk_name: FourCC = [chunk_name[0], chunk_name[1], chunk_name[2], chunk_name[3]];
        if chunk_name == [0; 4] {
            log::debug!("empty chunk id, ignoring size {chunk_size}");
            chunk_size = 0;
        }
        let chunk_size = chunk_size as usize;
        if chunk_size > d.len() {
            return Err(nom_context(data, "chunk size"));
        }
        let (d, chunk) = take(align::<2>(chunk_size).min(d.len()))(d)?;
        let chunk = &chunk[..chunk_size]; // trim any pad byte
        f(chunk_name, chunk)?;
        data = d;
    }
    Ok((&[], ()))
}

/// Labels the error of `res` with `ctx`, so [`convert_error`](crate::convert_error)
/// can name the chunk.
#[inline]
pub(crate) fn in_context<'a, T>(
    input: &'a [u8],
    ctx: &'static str,
    res: ParseResult<'a, T>,
) -> ParseResult<'a, T> {
    use nom::error::{ContextError, VerboseError};
    res.map_err(|e| e.map(|e| VerboseError::add_context(input, ctx, e)))
}

/// Splits the sub-type off a `LIST` payload.
#[inline]
pub fn list_type(chunk: &[u8]) -> ParseResult<'_, FourCC> {
    let (chunk, name) = take(4usize)(chunk)?;
    Ok((chunk, [name[0], name[1], name[2], name[3]]))
}

/// Appends a chunk header, payload and pad byte.
pub fn write_chunk(w: &mut Vec<u8>, id: &FourCC, data: &[u8]) {
    w.extend_from_slice(id);
    w.extend_from_slice(&(data.len() as u32).to_le_bytes());
    w.extend_from_slice(data);
    if data.len() % 2 == 1 {
        w.push(0);
    }
}

/// Builds a standalone chunk.
#[inline]
pub fn chunk(id: &FourCC, data: &[u8]) -> Vec<u8> {
    let mut w = Vec::with_capacity(data.len() + 9);
    write_chunk(&mut w, id, data);
    w
}

/// Builds a `LIST` chunk out of already serialized sub-chunks.
pub fn list<P: AsRef<[u8]>>(list_type: &FourCC, parts: impl IntoIterator<Item = P>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(list_type);
    for part in parts {
        payload.extend_from_slice(part.as_ref());
    }
    chunk(LIST, &payload)
}

/// Builds a complete `RIFF` form.
pub fn riff<P: AsRef<[u8]>>(form_type: &FourCC, parts: impl IntoIterator<Item = P>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(form_type);
    for part in parts {
        payload.extend_from_slice(part.as_ref());
    }
    chunk(RIFF, &payload)
}

/// Reads a fixed-layout record from the start of `data`.
#[inline]
pub(crate) fn read_record<T>(data: &[u8]) -> binrw::BinResult<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_le(&mut Cursor::new(data))
}

/// Appends a fixed-layout record to `w`.
#[inline]
pub(crate) fn write_record<T>(w: &mut Vec<u8>, value: &T) -> std::io::Result<()>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(w);
    cursor.set_position(cursor.get_ref().len() as u64);
    value.write_le(&mut cursor).map_err(crate::invalid_data)
}

/// Decodes a NUL-terminated (or full-width) single-byte string.
pub fn read_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect()
}

#[inline]
fn char_byte(c: char) -> u8 {
    u8::try_from(c as u32).unwrap_or(b'?')
}

/// Encodes the characters `skip..skip + N` of `s` into a zero padded field.
pub fn fixed_string<const N: usize>(s: &str, skip: usize) -> [u8; N] {
    let mut out = [0u8; N];
    for (dst, c) in out.iter_mut().zip(s.chars().skip(skip)) {
        *dst = char_byte(c);
    }
    out
}

/// Encodes an `INFO` style string: NUL terminated and padded to even length.
pub fn info_string(s: &str) -> Vec<u8> {
    let mut out: Vec<u8> = s.chars().map(char_byte).collect();
    out.push(0);
    if out.len() % 2 == 1 {
        out.push(0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_chunks_are_padded() {
        let c = chunk(b"abcd", &[1, 2, 3]);
        assert_eq!(c, [b'a', b'b', b'c', b'd', 3, 0, 0, 0, 1, 2, 3, 0]);
        let l = list(b"test", [c.clone()]);
        assert_eq!(&l[..4], b"LIST");
        assert_eq!(u32::from_le_bytes(l[4..8].try_into().unwrap()), 4 + 12);
    }

    #[test]
    fn walks_padded_chunks() {
        let mut data = chunk(b"one ", &[1]);
        data.extend(chunk(b"two ", &[2, 2]));
        let mut seen = Vec::new();
        parse_riff_chunks(&data, |id, payload| {
            seen.push((id, payload.to_vec()));
            Ok((&[], ()))
        })
        .unwrap();
        assert_eq!(seen, vec![(*b"one ", vec![1]), (*b"two ", vec![2, 2])]);
    }

    #[test]
    fn zero_id_chunk_has_no_payload() {
        let mut data = vec![0, 0, 0, 0, 0xff, 0xff, 0, 0];
        data.extend(chunk(b"next", &[7, 7]));
        let mut seen = Vec::new();
        parse_riff_chunks(&data, |id, payload| {
            seen.push((id, payload.len()));
            Ok((&[], ()))
        })
        .unwrap();
        assert_eq!(seen, vec![([0; 4], 0), (*b"next", 2)]);
    }

    #[test]
    fn strings() {
        assert_eq!(read_string(b"Piano\0\0junk"), "Piano");
        assert_eq!(fixed_string::<4>("abcdef", 2), *b"cdef");
        assert_eq!(fixed_string::<4>("ab", 0), [b'a', b'b', 0, 0]);
        assert_eq!(info_string("abc"), b"abc\0".to_vec());
        assert_eq!(info_string("ab"), b"ab\0\0".to_vec());
    }
}
