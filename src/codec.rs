// SPDX-License-Identifier: MIT
//! Primitive big-endian codec
//!
//! Fixed-width unsigned integers and length-prefixed text fields, the building
//! blocks of the container header.

use crate::error::{ContainerError, Result};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, Read, Write};

/// Width of the length prefix in front of every string field
pub const STRING_LENGTH_BYTES: usize = 2;

/// Widest integer the codec handles
const MAX_UINT_BYTES: usize = 8;

/// Write `value` as `byte_count` big-endian bytes.
///
/// High bits that do not fit in `byte_count * 8` bits are silently dropped.
pub fn write_uint<W: Write>(out: &mut W, value: u64, byte_count: usize) -> Result<usize> {
    check_width(byte_count)?;
    out.write_uint::<BigEndian>(truncate(value, byte_count), byte_count)?;
    Ok(byte_count)
}

/// Read a `byte_count`-wide big-endian unsigned integer
pub fn read_uint<R: Read>(input: &mut R, byte_count: usize) -> Result<u64> {
    read_uint_for("integer", input, byte_count)
}

/// Write a u16 byte-length prefix followed by the raw UTF-8 bytes.
///
/// Strings longer than 65535 bytes wrap the prefix; the full body is still written.
pub fn write_length_prefixed_string<W: Write>(out: &mut W, value: &str) -> Result<usize> {
    let bytes = value.as_bytes();
    write_uint(out, bytes.len() as u64, STRING_LENGTH_BYTES)?;
    out.write_all(bytes)?;
    Ok(STRING_LENGTH_BYTES + bytes.len())
}

/// Read a length-prefixed string, returning it with the number of bytes consumed.
///
/// Invalid UTF-8 is never rejected; offending sequences decode to U+FFFD.
pub fn read_length_prefixed_string<R: Read>(input: &mut R) -> Result<(String, usize)> {
    let length = read_uint_for("string length", input, STRING_LENGTH_BYTES)? as usize;
    let mut bytes = vec![0u8; length];
    read_full(input, &mut bytes, "string body")?;
    let value = String::from_utf8_lossy(&bytes).into_owned();
    Ok((value, STRING_LENGTH_BYTES + length))
}

pub(crate) fn read_uint_for<R: Read>(
    what: &'static str,
    input: &mut R,
    byte_count: usize,
) -> Result<u64> {
    check_width(byte_count)?;
    let mut buf = [0u8; MAX_UINT_BYTES];
    read_full(input, &mut buf[..byte_count], what)?;
    Ok(BigEndian::read_uint(&buf[..byte_count], byte_count))
}

/// Fill `buf` completely or report how far we got
pub(crate) fn read_full<R: Read>(input: &mut R, buf: &mut [u8], what: &'static str) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ContainerError::ShortRead {
                    what,
                    expected: buf.len(),
                    actual: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[inline]
fn check_width(byte_count: usize) -> Result<()> {
    if byte_count == 0 || byte_count > MAX_UINT_BYTES {
        return Err(ContainerError::InvalidArgument(
            "integer width must be between 1 and 8 bytes",
        ));
    }
    Ok(())
}

#[inline]
fn truncate(value: u64, byte_count: usize) -> u64 {
    if byte_count == MAX_UINT_BYTES {
        value
    } else {
        value & ((1u64 << (byte_count * 8)) - 1)
    }
}
