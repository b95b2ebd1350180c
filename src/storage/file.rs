//! File-based directory implementation.
//!
//! Each directory file maps to one file under the root path. Streams go
//! through the buffered layer; reads are positional, so duplicated handles
//! sharing one OS descriptor never disturb each other's cursor.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::storage::buffered::{
    BufferedIndexInput, BufferedIndexOutput, BufferedSink, BufferedSource,
};
use crate::storage::data_io::{IndexInput, IndexOutput};
use crate::storage::{Directory, DirectoryLock, IoAdvice};

/// Suffix appended to lock names to form lock file names.
pub const LOCK_SUFFIX: &str = ".lock";

fn default_buffer_size() -> usize {
    65536
}

/// Configuration for [`FsDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDirectoryConfig {
    /// Root directory holding the files.
    pub path: PathBuf,

    /// Scratch buffer size of input and output streams.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Whether to fsync file data when an output is flushed.
    #[serde(default)]
    pub sync_writes: bool,
}

impl FileDirectoryConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileDirectoryConfig {
            path: path.as_ref().to_path_buf(),
            buffer_size: default_buffer_size(),
            sync_writes: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(PilumError::invalid_config("buffer_size must be positive"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(PilumError::invalid_config("path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], pos: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, pos)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], pos: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, pos)
}

/// Positional reader over an open file.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    length: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(FileSource {
            file,
            path: path.to_path_buf(),
            length,
        })
    }
}

impl BufferedSource for FileSource {
    fn read_internal(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        loop {
            match read_at(&self.file, buf, pos) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(FileSource {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            length: self.length,
        })
    }

    fn reopen(&self) -> Result<Self> {
        let mut source = FileSource::open(&self.path)?;
        // Keep the length the original handle observed.
        source.length = self.length;
        Ok(source)
    }
}

/// Appends to a file opened for writing.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    sync_writes: bool,
}

impl BufferedSink for FileSink {
    fn write_internal(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn flush_internal(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }
}

/// Input stream type returned by [`FsDirectory::open`].
pub type FileIndexInput = BufferedIndexInput<FileSource>;

/// Output stream type returned by [`FsDirectory::create`].
pub type FileIndexOutput = BufferedIndexOutput<FileSink>;

/// A directory backed by the local filesystem.
#[derive(Debug)]
pub struct FsDirectory {
    root: PathBuf,
    config: FileDirectoryConfig,
}

impl FsDirectory {
    /// Open the directory at `config.path`, creating it if needed.
    pub fn new(config: FileDirectoryConfig) -> Result<Self> {
        let root = config.path.clone();

        if !root.exists() {
            fs::create_dir_all(&root)
                .map_err(|e| PilumError::storage(format!("Failed to create directory: {e}")))?;
        }

        if !root.is_dir() {
            return Err(PilumError::storage(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        Ok(FsDirectory { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Directory for FsDirectory {
    fn create(&self, name: &str) -> Option<Box<dyn IndexOutput>> {
        let path = self.file_path(name);
        let file = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to create {}: {e}", path.display());
                return None;
            }
        };

        debug!("Created file {}", path.display());
        Some(Box::new(BufferedIndexOutput::new(
            FileSink {
                file,
                sync_writes: self.config.sync_writes,
            },
            self.config.buffer_size,
        )))
    }

    fn open(&self, name: &str, _advice: IoAdvice) -> Option<Box<dyn IndexInput>> {
        let path = self.file_path(name);
        match FileSource::open(&path) {
            Ok(source) => Some(Box::new(BufferedIndexInput::new(
                source,
                self.config.buffer_size,
            ))),
            Err(PilumError::Io(e)) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to open {}: {e}", path.display());
                None
            }
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn length(&self, name: &str) -> Option<u64> {
        fs::metadata(self.file_path(name)).ok().map(|m| m.len())
    }

    fn mtime(&self, name: &str) -> Option<SystemTime> {
        fs::metadata(self.file_path(name))
            .and_then(|m| m.modified())
            .ok()
    }

    fn remove(&self, name: &str) -> bool {
        let path = self.file_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed file {}", path.display());
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove {}: {e}", path.display());
                false
            }
        }
    }

    fn rename(&self, src: &str, dst: &str) -> bool {
        let from = self.file_path(src);
        if !from.is_file() {
            return false;
        }
        match fs::rename(&from, self.file_path(dst)) {
            Ok(()) => {
                debug!("Renamed file {src} to {dst}");
                true
            }
            Err(e) => {
                warn!("Failed to rename {src} to {dst}: {e}");
                false
            }
        }
    }

    fn sync(&self, name: &str) -> bool {
        match File::open(self.file_path(name)).and_then(|f| f.sync_all()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to sync {name}: {e}");
                false
            }
        }
    }

    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> bool {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list {}: {e}", self.root.display());
                return false;
            }
        };

        let mut names = Vec::new();
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }

        names.iter().all(|name| visitor(name))
    }

    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock> {
        Box::new(FsLock {
            path: self.file_path(&format!("{name}{LOCK_SUFFIX}")),
            held: false,
        })
    }
}

/// An advisory lock represented by an exclusively created file.
///
/// Visible to every process sharing the directory.
#[derive(Debug)]
pub struct FsLock {
    path: PathBuf,
    held: bool,
}

impl DirectoryLock for FsLock {
    fn lock(&mut self) -> bool {
        if self.held {
            return false;
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    warn!("Failed to record owner in {}: {e}", self.path.display());
                }
                self.held = true;
                true
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => false,
            Err(e) => {
                warn!("Failed to create lock {}: {e}", self.path.display());
                false
            }
        }
    }

    fn unlock(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to release lock {}: {e}", self.path.display());
                false
            }
        }
    }

    fn is_locked(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for FsLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
