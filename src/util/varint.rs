//! Variable-length integer encoding utilities.
//!
//! LEB128-style encoding: each byte carries 7 payload bits, least
//! significant group first, and the high bit marks that more bytes follow.
//! A `u32` takes at most [`MAX_VARINT32_SIZE`] bytes and a `u64` at most
//! [`MAX_VARINT64_SIZE`]; longer sequences are rejected as corruption.
//!
//! Signed values go through zig-zag encoding first so that small negative
//! numbers stay short.

use std::io::{Read, Write};

use byteorder::ReadBytesExt;

use crate::error::{PilumError, Result};

/// Maximum encoded size of a 32-bit varint.
pub const MAX_VARINT32_SIZE: usize = 5;

/// Maximum encoded size of a 64-bit varint.
pub const MAX_VARINT64_SIZE: usize = 10;

/// Encode a u32 value into `out`, returning the number of bytes used.
///
/// `out` must hold at least [`size_u32`] bytes.
pub fn encode_u32_into(value: u32, out: &mut [u8]) -> usize {
    encode_u64_into(value as u64, out)
}

/// Encode a u64 value into `out`, returning the number of bytes used.
///
/// `out` must hold at least [`size_u64`] bytes.
pub fn encode_u64_into(value: u64, out: &mut [u8]) -> usize {
    let mut val = value;
    let mut i = 0;

    while val >= 0x80 {
        out[i] = (val as u8) | 0x80;
        val >>= 7;
        i += 1;
    }
    out[i] = val as u8;

    i + 1
}

/// Encode a u32 value using variable-length encoding.
pub fn encode_u32(value: u32) -> Vec<u8> {
    let mut bytes = [0u8; MAX_VARINT32_SIZE];
    let len = encode_u32_into(value, &mut bytes);
    bytes[..len].to_vec()
}

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = [0u8; MAX_VARINT64_SIZE];
    let len = encode_u64_into(value, &mut bytes);
    bytes[..len].to_vec()
}

/// Exact encoded size of a u32 value.
pub const fn size_u32(value: u32) -> usize {
    size_u64(value as u64)
}

/// Exact encoded size of a u64 value.
pub const fn size_u64(value: u64) -> usize {
    // 1 + floor(bit_length / 7), with zero taking one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a u32 value from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u32(bytes: &[u8]) -> Result<(u32, usize)> {
    let (value, read) = decode_capped(bytes, MAX_VARINT32_SIZE)?;
    if value > u32::MAX as u64 {
        return Err(PilumError::corruption("VarInt overflow"));
    }
    Ok((value as u32, read))
}

/// Decode a u64 value from the front of `bytes`.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    decode_capped(bytes, MAX_VARINT64_SIZE)
}

fn decode_capped(bytes: &[u8], max_size: usize) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if i >= max_size {
            return Err(PilumError::corruption("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    if bytes.len() >= max_size {
        Err(PilumError::corruption("VarInt overflow"))
    } else {
        Err(PilumError::eof("Incomplete VarInt"))
    }
}

/// Write a variable-length encoded u32 to a writer.
pub fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<usize> {
    let mut bytes = [0u8; MAX_VARINT32_SIZE];
    let len = encode_u32_into(value, &mut bytes);
    writer.write_all(&bytes[..len])?;
    Ok(len)
}

/// Write a variable-length encoded u64 to a writer.
pub fn write_u64<W: Write + ?Sized>(writer: &mut W, value: u64) -> Result<usize> {
    let mut bytes = [0u8; MAX_VARINT64_SIZE];
    let len = encode_u64_into(value, &mut bytes);
    writer.write_all(&bytes[..len])?;
    Ok(len)
}

/// Read a variable-length encoded u32 from a reader.
pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    let value = read_capped(reader, MAX_VARINT32_SIZE)?;
    if value > u32::MAX as u64 {
        return Err(PilumError::corruption("VarInt overflow"));
    }
    Ok(value as u32)
}

/// Read a variable-length encoded u64 from a reader.
pub fn read_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    read_capped(reader, MAX_VARINT64_SIZE)
}

fn read_capped<R: Read + ?Sized>(reader: &mut R, max_size: usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0;

    for _ in 0..max_size {
        let byte = reader.read_u8()?;

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(result);
        }

        shift += 7;
    }

    Err(PilumError::corruption("VarInt overflow"))
}

/// Zig-zag encode a signed 32-bit value.
#[inline]
pub const fn zigzag_encode_32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Zig-zag decode a 32-bit value.
#[inline]
pub const fn zigzag_decode_32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Zig-zag encode a signed 64-bit value.
#[inline]
pub const fn zigzag_encode_64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Zig-zag decode a 64-bit value.
#[inline]
pub const fn zigzag_decode_64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// A trait for types that can be encoded as variable-length integers.
pub trait VarInt: Sized {
    /// Encode this value as a variable-length integer.
    fn encode_varint(&self) -> Vec<u8>;

    /// Decode a variable-length integer from bytes.
    fn decode_varint(bytes: &[u8]) -> Result<(Self, usize)>;

    /// Exact number of bytes [`VarInt::encode_varint`] would produce.
    fn varint_size(&self) -> usize;

    /// Write this value as a variable-length integer to a writer.
    fn write_varint<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize>;

    /// Read a variable-length integer from a reader.
    fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<Self>;
}

impl VarInt for u32 {
    fn encode_varint(&self) -> Vec<u8> {
        encode_u32(*self)
    }

    fn decode_varint(bytes: &[u8]) -> Result<(Self, usize)> {
        decode_u32(bytes)
    }

    fn varint_size(&self) -> usize {
        size_u32(*self)
    }

    fn write_varint<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        write_u32(writer, *self)
    }

    fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        read_u32(reader)
    }
}

impl VarInt for u64 {
    fn encode_varint(&self) -> Vec<u8> {
        encode_u64(*self)
    }

    fn decode_varint(bytes: &[u8]) -> Result<(Self, usize)> {
        decode_u64(bytes)
    }

    fn varint_size(&self) -> usize {
        size_u64(*self)
    }

    fn write_varint<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        write_u64(writer, *self)
    }

    fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        read_u64(reader)
    }
}

impl VarInt for i32 {
    fn encode_varint(&self) -> Vec<u8> {
        encode_u32(zigzag_encode_32(*self))
    }

    fn decode_varint(bytes: &[u8]) -> Result<(Self, usize)> {
        let (value, read) = decode_u32(bytes)?;
        Ok((zigzag_decode_32(value), read))
    }

    fn varint_size(&self) -> usize {
        size_u32(zigzag_encode_32(*self))
    }

    fn write_varint<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        write_u32(writer, zigzag_encode_32(*self))
    }

    fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        read_u32(reader).map(zigzag_decode_32)
    }
}

impl VarInt for i64 {
    fn encode_varint(&self) -> Vec<u8> {
        encode_u64(zigzag_encode_64(*self))
    }

    fn decode_varint(bytes: &[u8]) -> Result<(Self, usize)> {
        let (value, read) = decode_u64(bytes)?;
        Ok((zigzag_decode_64(value), read))
    }

    fn varint_size(&self) -> usize {
        size_u64(zigzag_encode_64(*self))
    }

    fn write_varint<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        write_u64(writer, zigzag_encode_64(*self))
    }

    fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        read_u64(reader).map(zigzag_decode_64)
    }
}
