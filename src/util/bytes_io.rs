//! Fixed-width big-endian integer encoding.
//!
//! The functions here operate on any [`Read`]/[`Write`] cursor, so the same
//! code serves in-memory byte slices (`&[u8]` advances as it is read,
//! `Vec<u8>` grows as it is written) and the stream types in
//! [`crate::storage`].

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;

/// Integers with a fixed-width big-endian wire form.
///
/// Signed values are written as their unsigned bit pattern and
/// reinterpreted on read.
pub trait FixedWidth: Sized + Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode a value from the reader.
    fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self>;

    /// Encode this value into the writer.
    fn write_to<W: Write + ?Sized>(self, writer: &mut W) -> Result<()>;
}

macro_rules! impl_fixed_width {
    ($ty:ty, $unsigned:ty, $read:ident, $write:ident) => {
        impl FixedWidth for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
                Ok(reader.$read::<BigEndian>()? as $ty)
            }

            fn write_to<W: Write + ?Sized>(self, writer: &mut W) -> Result<()> {
                writer.$write::<BigEndian>(self as $unsigned)?;
                Ok(())
            }
        }
    };
}

impl_fixed_width!(u16, u16, read_u16, write_u16);
impl_fixed_width!(u32, u32, read_u32, write_u32);
impl_fixed_width!(u64, u64, read_u64, write_u64);
impl_fixed_width!(i16, u16, read_u16, write_u16);
impl_fixed_width!(i32, u32, read_u32, write_u32);
impl_fixed_width!(i64, u64, read_u64, write_u64);

/// Read a big-endian fixed-width value.
pub fn read_fixed<T: FixedWidth, R: Read + ?Sized>(reader: &mut R) -> Result<T> {
    T::read_from(reader)
}

/// Write a big-endian fixed-width value.
pub fn write_fixed<T: FixedWidth, W: Write + ?Sized>(writer: &mut W, value: T) -> Result<()> {
    value.write_to(writer)
}

/// Whether the host stores integers most-significant byte first.
pub const fn is_big_endian() -> bool {
    cfg!(target_endian = "big")
}

/// Host to network (big-endian) byte order.
#[inline]
pub const fn hton32(value: u32) -> u32 {
    value.to_be()
}

/// Network (big-endian) to host byte order.
#[inline]
pub const fn ntoh32(value: u32) -> u32 {
    u32::from_be(value)
}

/// Host to network (big-endian) byte order.
#[inline]
pub const fn hton64(value: u64) -> u64 {
    value.to_be()
}

/// Network (big-endian) to host byte order.
#[inline]
pub const fn ntoh64(value: u64) -> u64 {
    u64::from_be(value)
}
