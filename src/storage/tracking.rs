//! A directory wrapper that remembers which files were created through it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::storage::data_io::{IndexInput, IndexOutput};
use crate::storage::{Directory, DirectoryLock, IoAdvice};

/// Forwards every call to an inner [`Directory`], recording the names of
/// files created through it. Segment writers use this to learn which files
/// they produced.
#[derive(Debug)]
pub struct TrackingDirectory {
    inner: Arc<dyn Directory>,
    files: Mutex<HashSet<String>>,
}

impl TrackingDirectory {
    pub fn new(inner: Arc<dyn Directory>) -> Self {
        TrackingDirectory {
            inner,
            files: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &Arc<dyn Directory> {
        &self.inner
    }

    /// Names currently tracked, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.files.lock().iter().cloned().collect();
        files.sort();
        files
    }

    /// Drain the tracked names, sorted.
    pub fn take_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.files.lock().drain().collect();
        files.sort();
        files
    }
}

impl Directory for TrackingDirectory {
    fn create(&self, name: &str) -> Option<Box<dyn IndexOutput>> {
        let output = self.inner.create(name)?;
        self.files.lock().insert(name.to_string());
        Some(output)
    }

    fn open(&self, name: &str, advice: IoAdvice) -> Option<Box<dyn IndexInput>> {
        self.inner.open(name, advice)
    }

    fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    fn length(&self, name: &str) -> Option<u64> {
        self.inner.length(name)
    }

    fn mtime(&self, name: &str) -> Option<SystemTime> {
        self.inner.mtime(name)
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().remove(name);
        self.inner.remove(name)
    }

    fn rename(&self, src: &str, dst: &str) -> bool {
        if !self.inner.rename(src, dst) {
            return false;
        }
        let mut files = self.files.lock();
        if files.remove(src) {
            files.insert(dst.to_string());
        }
        true
    }

    fn sync(&self, name: &str) -> bool {
        self.inner.sync(name)
    }

    fn visit(&self, visitor: &mut dyn FnMut(&str) -> bool) -> bool {
        self.inner.visit(visitor)
    }

    fn make_lock(&self, name: &str) -> Box<dyn DirectoryLock> {
        self.inner.make_lock(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryDirectory;

    #[test]
    fn test_tracks_created_files() {
        let inner: Arc<dyn Directory> = Arc::new(MemoryDirectory::default());
        inner.create_output("preexisting").unwrap().close().unwrap();

        let tracking = TrackingDirectory::new(Arc::clone(&inner));
        tracking.create_output("_1.doc").unwrap().close().unwrap();
        tracking.create_output("_1.tmp").unwrap().close().unwrap();
        tracking.create_output("_1.skp").unwrap().close().unwrap();

        assert!(tracking.rename("_1.tmp", "_1.tim"));
        assert!(tracking.remove("_1.skp"));
        assert!(!tracking.rename("nope", "other"));

        assert_eq!(tracking.files(), vec!["_1.doc", "_1.tim"]);
        assert_eq!(tracking.take_files(), vec!["_1.doc", "_1.tim"]);
        assert!(tracking.files().is_empty());

        assert_eq!(inner.list_files(), vec!["_1.doc", "_1.tim", "preexisting"]);
    }
}
