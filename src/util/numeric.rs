//! Order-preserving numeric term encoding.
//!
//! Numbers are mapped to byte strings whose unsigned lexicographic order
//! matches the numeric order, so they can be stored in a sorted term
//! dictionary and range-scanned without decoding.
//!
//! Each encoded term starts with a marker byte `magic + shift`. The low
//! `shift` bits of the value are truncated and only the remaining
//! significant bytes are written, most significant first. Indexing the same
//! value at several shifts lets a range query match coarse terms for the
//! interior of a range and refine only at its edges.
//!
//! | type | magic |
//! |------|-------|
//! | `i32`, `u32` | `0x00` |
//! | `f32` | `0x20` |
//! | `i64`, `u64` | `0x60` |
//! | `f64` | `0xA0` |

use lazy_static::lazy_static;

use crate::error::{PilumError, Result};

/// Marker base for 32-bit integers.
pub const INT32_MAGIC: u8 = 0x00;
/// Marker base for 32-bit floats.
pub const FLOAT32_MAGIC: u8 = 0x20;
/// Marker base for 64-bit integers.
pub const INT64_MAGIC: u8 = 0x60;
/// Marker base for 64-bit floats.
pub const FLOAT64_MAGIC: u8 = 0xA0;

/// Largest possible encoded term (marker + 8 bytes).
pub const MAX_ENCODED_SIZE: usize = 9;

/// Precision step used when none is configured.
pub const DEFAULT_PRECISION_STEP: u32 = 16;

// Rust floats are IEEE-754 binary32/binary64; the sortable bit trick below
// depends on that layout.
const _: () = assert!(f32::MANTISSA_DIGITS == 24 && f64::MANTISSA_DIGITS == 53);

/// A numeric type with an order-preserving term encoding.
pub trait NumericTerm: Copy + PartialOrd + std::fmt::Debug {
    /// Width of the type in bits.
    const BITS: u32;
    /// Marker base written before the significant bytes.
    const MAGIC: u8;

    /// Map the value to an unsigned integer (in the low `BITS` bits) with
    /// the same ordering.
    fn to_sortable(self) -> u64;

    /// Inverse of [`NumericTerm::to_sortable`].
    fn from_sortable(bits: u64) -> Self;

    /// The value returned when every bit has been truncated.
    fn zero() -> Self;

    /// Pre-encoded sentinel terms for this type.
    fn bounds() -> &'static NumericBounds;
}

impl NumericTerm for u32 {
    const BITS: u32 = 32;
    const MAGIC: u8 = INT32_MAGIC;

    fn to_sortable(self) -> u64 {
        self as u64
    }

    fn from_sortable(bits: u64) -> Self {
        bits as u32
    }

    fn zero() -> Self {
        0
    }

    fn bounds() -> &'static NumericBounds {
        &SENTINELS.u32
    }
}

impl NumericTerm for i32 {
    const BITS: u32 = 32;
    const MAGIC: u8 = INT32_MAGIC;

    fn to_sortable(self) -> u64 {
        ((self as u32) ^ 0x8000_0000) as u64
    }

    fn from_sortable(bits: u64) -> Self {
        ((bits as u32) ^ 0x8000_0000) as i32
    }

    fn zero() -> Self {
        0
    }

    fn bounds() -> &'static NumericBounds {
        &SENTINELS.i32
    }
}

impl NumericTerm for u64 {
    const BITS: u32 = 64;
    const MAGIC: u8 = INT64_MAGIC;

    fn to_sortable(self) -> u64 {
        self
    }

    fn from_sortable(bits: u64) -> Self {
        bits
    }

    fn zero() -> Self {
        0
    }

    fn bounds() -> &'static NumericBounds {
        &SENTINELS.u64
    }
}

impl NumericTerm for i64 {
    const BITS: u32 = 64;
    const MAGIC: u8 = INT64_MAGIC;

    fn to_sortable(self) -> u64 {
        (self as u64) ^ (1 << 63)
    }

    fn from_sortable(bits: u64) -> Self {
        (bits ^ (1 << 63)) as i64
    }

    fn zero() -> Self {
        0
    }

    fn bounds() -> &'static NumericBounds {
        &SENTINELS.i64
    }
}

impl NumericTerm for f32 {
    const BITS: u32 = 32;
    const MAGIC: u8 = FLOAT32_MAGIC;

    fn to_sortable(self) -> u64 {
        // Negative values have their magnitude bits inverted so that larger
        // magnitudes sort lower, then the sign bit is flipped like an i32.
        let bits = self.to_bits() as i32;
        let ordered = bits ^ ((bits >> 31) & 0x7FFF_FFFF);
        ordered.to_sortable()
    }

    fn from_sortable(bits: u64) -> Self {
        let ordered = i32::from_sortable(bits);
        f32::from_bits((ordered ^ ((ordered >> 31) & 0x7FFF_FFFF)) as u32)
    }

    fn zero() -> Self {
        0.0
    }

    fn bounds() -> &'static NumericBounds {
        &SENTINELS.f32
    }
}

impl NumericTerm for f64 {
    const BITS: u32 = 64;
    const MAGIC: u8 = FLOAT64_MAGIC;

    fn to_sortable(self) -> u64 {
        let bits = self.to_bits() as i64;
        let ordered = bits ^ ((bits >> 63) & 0x7FFF_FFFF_FFFF_FFFF);
        ordered.to_sortable()
    }

    fn from_sortable(bits: u64) -> Self {
        let ordered = i64::from_sortable(bits);
        f64::from_bits((ordered ^ ((ordered >> 63) & 0x7FFF_FFFF_FFFF_FFFF)) as u64)
    }

    fn zero() -> Self {
        0.0
    }

    fn bounds() -> &'static NumericBounds {
        &SENTINELS.f64
    }
}

/// Number of bytes `encode` writes for a type of `bits` width at `shift`.
pub const fn encoded_size(bits: u32, shift: u32) -> usize {
    if shift >= bits {
        1
    } else {
        1 + (bits - shift).div_ceil(8) as usize
    }
}

/// Encode `value` with its low `shift` bits truncated into `out`.
///
/// Returns the number of bytes written; `out` must hold at least
/// [`encoded_size`] bytes ([`MAX_ENCODED_SIZE`] is always enough).
///
/// A full shift (`shift >= T::BITS`) writes only the marker, and that
/// marker equals the next type's magic: a 32-bit integer at shift 32 is
/// `FLOAT32_MAGIC`, a 64-bit integer at shift 64 is `FLOAT64_MAGIC`. Such
/// terms cannot be told apart by marker alone; the field must fix the type.
pub fn encode<T: NumericTerm>(value: T, shift: u32, out: &mut [u8]) -> usize {
    let shift = shift.min(T::BITS);
    out[0] = T::MAGIC + shift as u8;
    if shift == T::BITS {
        return 1;
    }

    let mask = u64::MAX << shift;
    let significant = (value.to_sortable() & mask) << (64 - T::BITS);
    let len = encoded_size(T::BITS, shift) - 1;
    out[1..=len].copy_from_slice(&significant.to_be_bytes()[..len]);

    len + 1
}

/// Encode `value` at `shift` into a new vector.
pub fn encode_to_vec<T: NumericTerm>(value: T, shift: u32) -> Vec<u8> {
    let mut buffer = [0u8; MAX_ENCODED_SIZE];
    let len = encode(value, shift, &mut buffer);
    buffer[..len].to_vec()
}

/// Recover the truncation shift from an encoded term of type `T`.
pub fn decode_shift<T: NumericTerm>(bytes: &[u8]) -> Result<u32> {
    let marker = *bytes
        .first()
        .ok_or_else(|| PilumError::corruption("Empty numeric term"))?;

    let shift = marker.wrapping_sub(T::MAGIC) as u32;
    if marker < T::MAGIC || shift > T::BITS {
        return Err(PilumError::corruption(format!(
            "Numeric marker {marker:#04x} does not belong to a {} term",
            std::any::type_name::<T>()
        )));
    }

    Ok(shift)
}

/// Decode a term produced by [`encode`].
pub fn decode<T: NumericTerm>(bytes: &[u8]) -> Result<T> {
    let shift = decode_shift::<T>(bytes)?;
    let expected = encoded_size(T::BITS, shift);
    if bytes.len() != expected {
        return Err(PilumError::corruption(format!(
            "Numeric term has {} bytes, marker expects {expected}",
            bytes.len()
        )));
    }

    if shift >= T::BITS {
        return Ok(T::zero());
    }

    let mut be = [0u8; 8];
    be[..expected - 1].copy_from_slice(&bytes[1..]);
    let sortable = u64::from_be_bytes(be) >> (64 - T::BITS);

    Ok(T::from_sortable(sortable))
}

/// Pre-encoded range sentinels for one numeric type.
#[derive(Debug, Clone)]
pub struct NumericBounds {
    /// Encoding of the smallest finite value.
    pub min: Vec<u8>,
    /// Encoding of the largest finite value.
    pub max: Vec<u8>,
    /// Encoding of positive infinity (floating point only).
    pub inf: Option<Vec<u8>>,
    /// Encoding of negative infinity (floating point only).
    pub ninf: Option<Vec<u8>>,
}

impl NumericBounds {
    fn integral<T: NumericTerm>(min: T, max: T) -> Self {
        NumericBounds {
            min: encode_to_vec(min, 0),
            max: encode_to_vec(max, 0),
            inf: None,
            ninf: None,
        }
    }

    fn floating<T: NumericTerm>(min: T, max: T, inf: T, ninf: T) -> Self {
        NumericBounds {
            min: encode_to_vec(min, 0),
            max: encode_to_vec(max, 0),
            inf: Some(encode_to_vec(inf, 0)),
            ninf: Some(encode_to_vec(ninf, 0)),
        }
    }
}

/// Process-wide table of sentinel encodings, built once on first use.
#[derive(Debug)]
pub struct SentinelTable {
    pub i32: NumericBounds,
    pub u32: NumericBounds,
    pub i64: NumericBounds,
    pub u64: NumericBounds,
    pub f32: NumericBounds,
    pub f64: NumericBounds,
}

lazy_static! {
    static ref SENTINELS: SentinelTable = SentinelTable {
        i32: NumericBounds::integral(i32::MIN, i32::MAX),
        u32: NumericBounds::integral(u32::MIN, u32::MAX),
        i64: NumericBounds::integral(i64::MIN, i64::MAX),
        u64: NumericBounds::integral(u64::MIN, u64::MAX),
        f32: NumericBounds::floating(f32::MIN, f32::MAX, f32::INFINITY, f32::NEG_INFINITY),
        f64: NumericBounds::floating(f64::MIN, f64::MAX, f64::INFINITY, f64::NEG_INFINITY),
    };
}

/// The shared sentinel table.
pub fn sentinels() -> &'static SentinelTable {
    &SENTINELS
}

/// Iterator over the precision-step terms of one value.
///
/// Yields `encode(value, shift)` for `shift = 0, step, 2 * step, ...` while
/// `shift < BITS`.
#[derive(Debug, Clone)]
pub struct NumericTerms<T: NumericTerm> {
    value: T,
    step: u32,
    shift: u32,
}

/// Expand `value` into its precision-step terms.
///
/// A `precision_step` of zero is treated as "full precision only".
pub fn numeric_terms<T: NumericTerm>(value: T, precision_step: u32) -> NumericTerms<T> {
    NumericTerms {
        value,
        step: if precision_step == 0 { T::BITS } else { precision_step },
        shift: 0,
    }
}

impl<T: NumericTerm> NumericTerms<T> {
    /// The shift of the next term to be produced.
    pub fn shift(&self) -> u32 {
        self.shift
    }
}

impl<T: NumericTerm> Iterator for NumericTerms<T> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.shift >= T::BITS {
            return None;
        }
        let term = encode_to_vec(self.value, self.shift);
        self.shift += self.step;
        Some(term)
    }
}
