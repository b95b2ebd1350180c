//! # Pilum
//!
//! Storage and indexing core for an embeddable full-text search engine.
//!
//! ## Features
//!
//! - Byte codecs: fixed-width big-endian integers, LEB128 varints, zig-zag
//! - Order-preserving numeric term encoding with precision-step truncation
//! - Directory abstraction with buffered, checksummed streams
//! - Paged in-memory directory and a plain filesystem directory
//! - Multi-level skip lists for postings traversal
//! - Minimal acyclic FST term dictionaries

pub mod error;
pub mod lexical;
pub mod storage;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
