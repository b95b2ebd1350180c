//! Storage abstraction layer for Pilum.
//!
//! This module exposes the directory facade shared by the postings, skip
//! list and term dictionary writers. Memory and filesystem backends can be
//! swapped without touching higher-level code.
//!
//! # Architecture
//!
//! - **Directory trait**: named files with create/open/remove/rename and
//!   advisory locks
//! - **Streams**: [`data_io`] defines the cursor traits, [`buffered`] the
//!   windowed implementations used by the backends
//! - **StorageConfig enum**: Type-safe configuration for supported backends
//! - **DirectoryFactory**: Helper for constructing concrete directories
//!
//! Directory operations report routine failures (missing file, lock held)
//! through `Option`/`bool` rather than errors; the `*_input`/`*_output`
//! helpers convert them into [`Result`]s where `?` is more convenient.
//!
//! # Example
//!
//! ```
//! use pilum::storage::data_io::{DataInput, DataOutput, IndexOutput};
//! use pilum::storage::memory::MemoryDirectoryConfig;
//! use pilum::storage::{DirectoryFactory, StorageConfig};
//!
//! # fn main() -> pilum::error::Result<()> {
//! let dir = DirectoryFactory::create(StorageConfig::Memory(MemoryDirectoryConfig::default()))?;
//!
//! let mut output = dir.create_output("segment.doc")?;
//! output.write_vint(42)?;
//! output.close()?;
//!
//! let mut input = dir.open_input("segment.doc")?;
//! assert_eq!(input.read_vint()?, 42);
//! assert!(input.eof());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::storage::data_io::{IndexInput, IndexOutput};

pub mod buffered;
pub mod data_io;
pub mod file;
pub mod memory;
pub mod slice;
pub mod tracking;

/// Expected access pattern of an opened file.
///
/// Backends may use it to pick caching behaviour; it never changes results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoAdvice {
    #[default]
    Normal,
    Sequential,
    Random,
    ReadOnce,
}

/// A flat namespace of files.
///
/// Implementations are shared across threads; the streams they hand out are
/// single-owner.
pub trait Directory: Send + Sync + std::fmt::Debug {
    /// Create `name`, replacing any previous content, and return an
    /// exclusive writer. Returns `None` if the backing store fails.
    fn create(&self, name: &str) -> Option<Box<dyn IndexOutput>>;

    /// Open `name` for reading. Returns `None` if it does not exist.
    fn open(&self, name: &str, advice: IoAdvice) -> Option<Box<dyn IndexInput>>;

    fn exists(&self, name: &str) -> bool;

    /// Length of `name` in bytes.
    fn length(&self, name: &str) -> Option<u64>;

    /// Last modification time of `name`.
    fn mtime(&self, name: &str) -> Option<SystemTime>;

    /// Remove `name`. Returns `false` if it did not exist or removal failed.
    fn remove(&self, name: &str) -> bool;

    /// Move the content of `src` to `dst`, replacing `dst`.
    fn rename(&self, src: &str, dst: &str) -> bool;

    /// Make the content of `name` durable.
    fn sync(&self, name: &str) -> bool;

    /// Call `visitor` with each file name until it returns `false`.
    ///
    /// Names are collected before the first call, so the visitor may use
    /// the directory. Returns `false` if the visit stopped early.
    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> bool;

    /// An advisory lock named `name`, initially not held.
    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock>;

    /// All file names, sorted.
    fn list_files(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit(&mut |name| {
            names.push(name.to_string());
            true
        });
        names.sort();
        names
    }

    /// [`Directory::open`] with normal advice, failing with `NotFound`.
    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        self.open(name, IoAdvice::Normal)
            .ok_or_else(|| PilumError::not_found(name))
    }

    /// [`Directory::create`], failing with a storage error.
    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        self.create(name)
            .ok_or_else(|| PilumError::storage(format!("Failed to create {name}")))
    }
}

/// An advisory lock obtained from [`Directory::make_lock`].
///
/// Held locks are released when the handle is dropped.
pub trait DirectoryLock: Send + std::fmt::Debug {
    /// Acquire the lock. Returns `false` if it is already held.
    fn lock(&mut self) -> bool;

    /// Release the lock if this handle holds it. Safe to call repeatedly.
    fn unlock(&mut self) -> bool;

    /// Whether any handle currently holds the lock.
    fn is_locked(&self) -> bool;

    /// Retry [`DirectoryLock::lock`] until it succeeds or `timeout` elapses.
    fn try_lock(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.lock() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(10)));
        }
    }
}

/// Configuration for directory backends.
///
/// # Example
///
/// ```
/// use pilum::storage::StorageConfig;
/// use pilum::storage::file::FileDirectoryConfig;
/// use pilum::storage::memory::MemoryDirectoryConfig;
///
/// // File directory with custom settings
/// let mut file_config = FileDirectoryConfig::new("/data/index");
/// file_config.buffer_size = 131072; // 128KB
/// let config = StorageConfig::File(file_config);
///
/// // Memory directory with default settings
/// let config = StorageConfig::Memory(MemoryDirectoryConfig::default());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    File(file::FileDirectoryConfig),

    Memory(memory::MemoryDirectoryConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(memory::MemoryDirectoryConfig::default())
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            StorageConfig::File(config) => config.validate(),
            StorageConfig::Memory(config) => config.validate(),
        }
    }
}

/// A factory for creating directory instances.
pub struct DirectoryFactory;

impl DirectoryFactory {
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Directory>> {
        config.validate()?;
        match config {
            StorageConfig::Memory(mem_config) => {
                Ok(Arc::new(memory::MemoryDirectory::new(mem_config)?))
            }
            StorageConfig::File(file_config) => {
                Ok(Arc::new(file::FsDirectory::new(file_config)?))
            }
        }
    }
}
