//! In-memory directory implementation for testing and caching.
//!
//! Files are stored as a list of pages whose sizes grow geometrically:
//! page `i` holds `base_page_size << min(i, max_growth)` bytes. Pages are
//! reference counted, so opening a file only clones page handles; a writer
//! appending to a page that a reader still holds copies it first, which
//! keeps every reader's view immutable.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;
use std::time::SystemTime;

use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::storage::buffered::{BufferedIndexOutput, BufferedSink};
use crate::storage::data_io::{BufferHint, DataInput, IndexInput, IndexOutput};
use crate::storage::{Directory, DirectoryLock, IoAdvice};

/// Configuration for [`MemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDirectoryConfig {
    /// Size of the first page in bytes. Must be a power of two.
    pub base_page_size: usize,

    /// Number of times the page size doubles before it stays constant.
    pub max_growth: u32,

    /// Scratch buffer size of output streams.
    pub buffer_size: usize,
}

impl Default for MemoryDirectoryConfig {
    fn default() -> Self {
        MemoryDirectoryConfig {
            base_page_size: 256,
            max_growth: 8,
            buffer_size: 1024,
        }
    }
}

impl MemoryDirectoryConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.base_page_size.is_power_of_two() {
            return Err(PilumError::invalid_config(format!(
                "base_page_size must be a power of two, got {}",
                self.base_page_size
            )));
        }
        if self.max_growth > 24 {
            return Err(PilumError::invalid_config(format!(
                "max_growth must be at most 24, got {}",
                self.max_growth
            )));
        }
        if self.buffer_size == 0 {
            return Err(PilumError::invalid_config("buffer_size must be positive"));
        }
        Ok(())
    }
}

/// Page geometry of a [`MemoryFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    base: usize,
    max_growth: u32,
}

impl PageLayout {
    pub fn new(base: usize, max_growth: u32) -> Self {
        PageLayout { base, max_growth }
    }

    /// Size of page `index`.
    pub fn page_size(&self, index: usize) -> usize {
        self.base << index.min(self.max_growth as usize)
    }

    /// File offset of the first byte of page `index`.
    pub fn page_start(&self, index: usize) -> u64 {
        let growth = self.max_growth as usize;
        let base = self.base as u64;
        if index <= growth {
            base * ((1u64 << index) - 1)
        } else {
            base * ((1u64 << growth) - 1) + (index - growth) as u64 * (base << growth)
        }
    }

    /// Page index and in-page offset holding file offset `offset`.
    pub fn locate(&self, offset: u64) -> (usize, usize) {
        let base = self.base as u64;
        let growing = base * ((1u64 << self.max_growth) - 1);
        let index = if offset < growing {
            (offset / base + 1).ilog2() as usize
        } else {
            self.max_growth as usize + ((offset - growing) / (base << self.max_growth)) as usize
        };
        (index, (offset - self.page_start(index)) as usize)
    }
}

/// An append-only paged byte buffer.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    layout: PageLayout,
    pages: Vec<Arc<Vec<u8>>>,
    length: u64,
    mtime: SystemTime,
}

impl MemoryFile {
    pub fn new(layout: PageLayout) -> Self {
        MemoryFile {
            layout,
            pages: Vec::new(),
            length: 0,
            mtime: SystemTime::now(),
        }
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    /// Total bytes allocated across all pages.
    pub fn capacity(&self) -> u64 {
        self.layout.page_start(self.pages.len())
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Append `data` at the end of the file, allocating pages as needed.
    pub fn append(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let (index, offset) = self.layout.locate(self.length);
            if index == self.pages.len() {
                self.pages
                    .push(Arc::new(vec![0u8; self.layout.page_size(index)]));
            }

            let page = Arc::make_mut(&mut self.pages[index]);
            let n = data.len().min(page.len() - offset);
            page[offset..offset + n].copy_from_slice(&data[..n]);

            self.length += n as u64;
            data = &data[n..];
        }
        self.mtime = SystemTime::now();
    }

    /// Drop all content.
    pub fn reset(&mut self) {
        self.pages.clear();
        self.length = 0;
        self.mtime = SystemTime::now();
    }

    /// An immutable view of the current content.
    pub fn snapshot(&self) -> Arc<MemorySnapshot> {
        Arc::new(MemorySnapshot {
            layout: self.layout,
            pages: self.pages.clone(),
            length: self.length,
        })
    }
}

/// Pages and length of a [`MemoryFile`] captured when a reader opened it.
#[derive(Debug)]
pub struct MemorySnapshot {
    layout: PageLayout,
    pages: Vec<Arc<Vec<u8>>>,
    length: u64,
}

impl MemorySnapshot {
    /// The longest contiguous run starting at `pos`, capped at `max` bytes.
    fn run(&self, pos: u64, max: usize) -> &[u8] {
        let (index, offset) = self.layout.locate(pos);
        let page = &self.pages[index];
        let in_file = (self.length - pos).min(max as u64) as usize;
        let n = in_file.min(page.len() - offset);
        &page[offset..offset + n]
    }
}

/// Read cursor over a [`MemorySnapshot`].
#[derive(Debug, Clone)]
pub struct MemoryIndexInput {
    name: String,
    snapshot: Arc<MemorySnapshot>,
    pos: u64,
}

impl MemoryIndexInput {
    pub fn new(name: impl Into<String>, snapshot: Arc<MemorySnapshot>) -> Self {
        MemoryIndexInput {
            name: name.into(),
            snapshot,
            pos: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Read for MemoryIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_bytes(buf).map_err(std::io::Error::from)
    }
}

impl DataInput for MemoryIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.snapshot.length {
            return Err(PilumError::eof(format!(
                "Read past end of {} (length {})",
                self.name, self.snapshot.length
            )));
        }
        let (index, offset) = self.snapshot.layout.locate(self.pos);
        self.pos += 1;
        Ok(self.snapshot.pages[index][offset])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut copied = 0;
        while copied < buf.len() && self.pos < self.snapshot.length {
            let run = self.snapshot.run(self.pos, buf.len() - copied);
            buf[copied..copied + run.len()].copy_from_slice(run);
            copied += run.len();
            self.pos += run.len() as u64;
        }
        Ok(copied)
    }

    fn file_pointer(&self) -> u64 {
        self.pos
    }

    fn length(&self) -> u64 {
        self.snapshot.length
    }
}

impl IndexInput for MemoryIndexInput {
    fn duplicate(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(self.clone()))
    }

    fn reopen(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(self.clone()))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.snapshot.length {
            return Err(PilumError::eof(format!(
                "Seek to {pos} beyond end of {} (length {})",
                self.name, self.snapshot.length
            )));
        }
        self.pos = pos;
        Ok(())
    }

    // Snapshot pages never change, so both hints are served.
    fn read_buffer(&mut self, size: usize, _hint: BufferHint) -> Option<&[u8]> {
        if size == 0 {
            return Some(&[]);
        }
        if self.pos + size as u64 > self.snapshot.length {
            return None;
        }
        let run = self.snapshot.run(self.pos, size);
        if run.len() < size {
            return None;
        }
        self.pos += size as u64;
        Some(run)
    }

    fn checksum(&mut self, len: u64) -> Result<u64> {
        let end = self.pos.saturating_add(len).min(self.snapshot.length);
        let mut hasher = crc32fast::Hasher::new();
        let mut pos = self.pos;
        while pos < end {
            let run = self.snapshot.run(pos, (end - pos).min(usize::MAX as u64) as usize);
            hasher.update(run);
            pos += run.len() as u64;
        }
        Ok(hasher.finalize() as u64)
    }
}

/// Appends flushed bytes of a [`BufferedIndexOutput`] to a shared file.
#[derive(Debug)]
pub struct MemoryFileSink {
    file: Arc<RwLock<MemoryFile>>,
}

impl BufferedSink for MemoryFileSink {
    fn write_internal(&mut self, data: &[u8]) -> Result<()> {
        self.file.write().append(data);
        Ok(())
    }

    fn flush_internal(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Output stream type returned by [`MemoryDirectory::create`].
pub type MemoryIndexOutput = BufferedIndexOutput<MemoryFileSink>;

/// A directory holding every file in process memory.
#[derive(Debug)]
pub struct MemoryDirectory {
    config: MemoryDirectoryConfig,
    files: RwLock<HashMap<String, Arc<RwLock<MemoryFile>>>>,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::with_valid_config(MemoryDirectoryConfig::default())
    }
}

impl MemoryDirectory {
    /// Create a directory, rejecting page geometries `PageLayout` cannot address.
    pub fn new(config: MemoryDirectoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: MemoryDirectoryConfig) -> Self {
        MemoryDirectory {
            config,
            files: RwLock::new(HashMap::new()),
            locks: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &MemoryDirectoryConfig {
        &self.config
    }

    fn layout(&self) -> PageLayout {
        PageLayout::new(self.config.base_page_size, self.config.max_growth)
    }

    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    pub fn total_size(&self) -> u64 {
        self.files.read().values().map(|file| file.read().len()).sum()
    }

    /// Handle to the file stored under `name`.
    pub fn file(&self, name: &str) -> Option<Arc<RwLock<MemoryFile>>> {
        self.files.read().get(name).cloned()
    }

    pub fn clear(&self) {
        self.files.write().clear();
    }
}

impl Directory for MemoryDirectory {
    fn create(&self, name: &str) -> Option<Box<dyn IndexOutput>> {
        let file = {
            let mut files = self.files.write();
            match files.get(name) {
                Some(file) => {
                    file.write().reset();
                    Arc::clone(file)
                }
                None => {
                    let file = Arc::new(RwLock::new(MemoryFile::new(self.layout())));
                    files.insert(name.to_string(), Arc::clone(&file));
                    file
                }
            }
        };

        debug!("Created memory file {name}");
        Some(Box::new(BufferedIndexOutput::new(
            MemoryFileSink { file },
            self.config.buffer_size,
        )))
    }

    fn open(&self, name: &str, _advice: IoAdvice) -> Option<Box<dyn IndexInput>> {
        let snapshot = self.files.read().get(name)?.read().snapshot();
        Some(Box::new(MemoryIndexInput::new(name, snapshot)))
    }

    fn exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn length(&self, name: &str) -> Option<u64> {
        self.files.read().get(name).map(|file| file.read().len())
    }

    fn mtime(&self, name: &str) -> Option<SystemTime> {
        self.files.read().get(name).map(|file| file.read().mtime())
    }

    fn remove(&self, name: &str) -> bool {
        let removed = self.files.write().remove(name).is_some();
        if removed {
            debug!("Removed memory file {name}");
        }
        removed
    }

    fn rename(&self, src: &str, dst: &str) -> bool {
        let mut files = self.files.write();
        match files.remove(src) {
            Some(file) => {
                files.insert(dst.to_string(), file);
                debug!("Renamed memory file {src} to {dst}");
                true
            }
            None => false,
        }
    }

    fn sync(&self, name: &str) -> bool {
        self.exists(name)
    }

    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> bool {
        // Snapshot the names so the visitor may call back into the directory.
        let names: Vec<String> = self.files.read().keys().cloned().collect();
        names.iter().all(|name| visitor(name))
    }

    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock> {
        Box::new(MemoryLock {
            locks: Arc::clone(&self.locks),
            name: name.to_string(),
            held: false,
        })
    }
}

/// An in-process advisory lock scoped to one [`MemoryDirectory`].
#[derive(Debug)]
pub struct MemoryLock {
    locks: Arc<Mutex<HashSet<String>>>,
    name: String,
    held: bool,
}

impl DirectoryLock for MemoryLock {
    fn lock(&mut self) -> bool {
        if self.held {
            return false;
        }
        self.held = self.locks.lock().insert(self.name.clone());
        self.held
    }

    fn unlock(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.held = false;
        self.locks.lock().remove(&self.name)
    }

    fn is_locked(&self) -> bool {
        self.locks.lock().contains(&self.name)
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
