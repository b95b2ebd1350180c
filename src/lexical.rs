//! Lexical index structures.
//!
//! This module provides the building blocks that postings and segment code
//! sit on: multi-level skip lists for fast-forwarding through postings and
//! FST-backed term dictionaries.

pub mod fst;
pub mod skip_list;
pub mod term_dict;

/// Document identifier within a segment.
pub type DocId = u32;

/// Reserved document id values.
pub mod doc_limits {
    use super::DocId;

    /// Id of a cursor that has not been positioned yet.
    pub const fn invalid() -> DocId {
        0
    }

    /// First valid document id.
    pub const fn min() -> DocId {
        1
    }

    /// Sentinel returned once a cursor is exhausted.
    pub const fn eof() -> DocId {
        DocId::MAX
    }

    pub const fn valid(doc: DocId) -> bool {
        doc != invalid()
    }

    pub const fn is_eof(doc: DocId) -> bool {
        doc == eof()
    }
}
