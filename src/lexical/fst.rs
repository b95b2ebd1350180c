//! Minimal acyclic finite-state transducers over byte labels.
//!
//! An FST maps sorted byte-string keys to byte-string payloads. Shared key
//! prefixes share states, and payloads are split across the arcs of the
//! accepting path using the left string semiring: the concatenation of arc
//! weights along a key's path, followed by the final weight of the state it
//! ends in, is the key's payload.
//!
//! [`FstBuilder`] constructs the minimal FST from keys inserted in strictly
//! increasing order. The result is an [`ImmutableFst`] stored in flat
//! arrays, which can be serialized, matched arc by arc with
//! [`SortedArcMatcher`], or enumerated with [`FstStream`].
//!
//! # Example
//!
//! ```
//! use pilum::lexical::fst::FstBuilder;
//!
//! let mut builder = FstBuilder::new();
//! builder.insert(b"mop", b"1");
//! builder.insert(b"moth", b"2");
//! builder.insert(b"pop", b"1");
//! let (fst, stats) = builder.finish();
//!
//! assert_eq!(fst.get(b"moth"), Some(b"2".to_vec()));
//! assert_eq!(fst.get(b"mo"), None);
//! assert_eq!(stats.num_states, fst.num_states());
//! ```

pub mod builder;
pub mod immutable;
pub mod matcher;
pub mod stream;
pub mod weight;

pub use builder::{FstBuilder, FstStats};
pub use immutable::{FstArc, ImmutableFst};
pub use matcher::SortedArcMatcher;
pub use stream::FstStream;
pub use weight::{Semiring, StringLeftWeight};

/// Index of a state in an [`ImmutableFst`].
pub type StateId = u32;

/// Serialization format version.
pub const FST_VERSION: u8 = 0;

/// Property bits recorded in the serialized header.
pub mod properties {
    /// Arcs are stored explicitly rather than computed on demand.
    pub const EXPANDED: u64 = 0x0000_0000_0000_0001;
    /// At most one arc per input label leaves each state.
    pub const I_DETERMINISTIC: u64 = 0x0000_0000_0004_0000;
    /// Arcs leaving each state are sorted by input label.
    pub const ILABEL_SORTED: u64 = 0x0000_0000_1000_0000;
    /// The transducer has no cycles.
    pub const ACYCLIC: u64 = 0x0000_0008_0000_0000;

    /// Properties of every FST produced by the builder.
    pub const BUILT: u64 = EXPANDED | I_DETERMINISTIC | ILABEL_SORTED | ACYCLIC;
}
