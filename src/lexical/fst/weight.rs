//! Arc and final weights.

use std::fmt::Debug;

/// A semiring over FST weights.
pub trait Semiring: Clone + PartialEq + Debug {
    /// Identity of [`Semiring::plus`]; also marks a non-final state.
    fn zero() -> Self;

    /// Identity of [`Semiring::times`].
    fn one() -> Self;

    fn plus(&self, other: &Self) -> Self;

    fn times(&self, other: &Self) -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    fn is_one(&self) -> bool {
        *self == Self::one()
    }
}

/// The left string semiring over bytes.
///
/// `plus` is the longest common prefix, `times` is concatenation, `one` is
/// the empty string and `zero` is an absorbing element standing for
/// "no string at all".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StringLeftWeight {
    Zero,
    Value(Vec<u8>),
}

impl StringLeftWeight {
    /// The bytes of a non-zero weight.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StringLeftWeight::Zero => None,
            StringLeftWeight::Value(bytes) => Some(bytes),
        }
    }

    /// Byte length; zero for both `Zero` and `one`.
    pub fn len(&self) -> usize {
        self.as_bytes().map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The weight `w` such that `prefix.times(w) == self`.
    ///
    /// `prefix` must be a left factor of `self`, as produced by
    /// [`Semiring::plus`]; dividing by `Zero` yields `Zero`.
    pub fn divide_left(&self, prefix: &Self) -> Self {
        match (self, prefix) {
            (StringLeftWeight::Value(bytes), StringLeftWeight::Value(prefix)) => {
                StringLeftWeight::Value(bytes[prefix.len().min(bytes.len())..].to_vec())
            }
            _ => StringLeftWeight::Zero,
        }
    }
}

impl From<&[u8]> for StringLeftWeight {
    fn from(bytes: &[u8]) -> Self {
        StringLeftWeight::Value(bytes.to_vec())
    }
}

impl From<Vec<u8>> for StringLeftWeight {
    fn from(bytes: Vec<u8>) -> Self {
        StringLeftWeight::Value(bytes)
    }
}

impl Semiring for StringLeftWeight {
    fn zero() -> Self {
        StringLeftWeight::Zero
    }

    fn one() -> Self {
        StringLeftWeight::Value(Vec::new())
    }

    fn plus(&self, other: &Self) -> Self {
        match (self, other) {
            (StringLeftWeight::Zero, w) | (w, StringLeftWeight::Zero) => w.clone(),
            (StringLeftWeight::Value(a), StringLeftWeight::Value(b)) => {
                let common = a.iter().zip(b).take_while(|(x, y)| x == y).count();
                StringLeftWeight::Value(a[..common].to_vec())
            }
        }
    }

    fn times(&self, other: &Self) -> Self {
        match (self, other) {
            (StringLeftWeight::Value(a), StringLeftWeight::Value(b)) => {
                let mut bytes = Vec::with_capacity(a.len() + b.len());
                bytes.extend_from_slice(a);
                bytes.extend_from_slice(b);
                StringLeftWeight::Value(bytes)
            }
            _ => StringLeftWeight::Zero,
        }
    }
}
