//! Error types for the Pilum library.
//!
//! All fallible operations return [`Result<T>`], whose error type is the
//! [`PilumError`] enum. End-of-stream is reported separately from backing
//! store faults so that readers can treat it as "no more data".
//!
//! # Examples
//!
//! ```
//! use pilum::error::{PilumError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PilumError::corruption("varint too long"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Pilum operations.
#[derive(Error, Debug)]
pub enum PilumError {
    /// I/O errors raised by the backing store.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// Attempted read past the logical end of a stream.
    #[error("Unexpected end of stream: {0}")]
    Eof(String),

    /// Directory lookup for a name that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed data encountered while decoding.
    #[error("Corrupted data: {0}")]
    Corruption(String),

    /// Unrecognized serialization format or version.
    #[error("Unsupported format: {0}")]
    Format(String),

    /// Operation not valid in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with PilumError.
pub type Result<T> = std::result::Result<T, PilumError>;

impl PilumError {
    /// Create a new end-of-stream error.
    pub fn eof<S: Into<String>>(msg: S) -> Self {
        PilumError::Eof(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        PilumError::NotFound(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        PilumError::Storage(msg.into())
    }

    /// Create a new corruption error.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        PilumError::Corruption(msg.into())
    }

    /// Create a new format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        PilumError::Format(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        PilumError::InvalidOperation(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(msg.into())
    }

    /// Whether this error signals end of stream rather than a fault.
    pub fn is_eof(&self) -> bool {
        matches!(self, PilumError::Eof(_))
    }
}

impl From<io::Error> for PilumError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            PilumError::Eof(err.to_string())
        } else {
            PilumError::Io(err)
        }
    }
}

impl From<PilumError> for io::Error {
    fn from(err: PilumError) -> Self {
        match err {
            PilumError::Io(e) => e,
            PilumError::Eof(msg) => io::Error::new(io::ErrorKind::UnexpectedEof, msg),
            PilumError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            other => io::Error::other(other.to_string()),
        }
    }
}
