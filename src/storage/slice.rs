//! Bounded views over an [`IndexInput`].

use std::io::Read;

use crate::error::{PilumError, Result};
use crate::storage::data_io::{BufferHint, DataInput, IndexInput};

/// The range `[begin, begin + len)` of another input, exposed as a stream of
/// its own. Positions, [`DataInput::length`] and [`DataInput::eof`] are
/// relative to the slice.
#[derive(Debug)]
pub struct SlicedIndexInput {
    inner: Box<dyn IndexInput>,
    begin: u64,
    len: u64,
}

impl SlicedIndexInput {
    /// Wrap `inner`, positioning it at the start of the slice.
    pub fn new(mut inner: Box<dyn IndexInput>, begin: u64, len: u64) -> Result<Self> {
        let end = begin
            .checked_add(len)
            .ok_or_else(|| PilumError::corruption("Slice bounds overflow"))?;
        if end > inner.length() {
            return Err(PilumError::eof(format!(
                "Slice [{begin}, {end}) exceeds stream length {}",
                inner.length()
            )));
        }
        inner.seek(begin)?;
        Ok(SlicedIndexInput { inner, begin, len })
    }

    /// Absolute offset of the slice in the wrapped stream.
    pub fn offset(&self) -> u64 {
        self.begin
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.file_pointer())
    }

    fn rebound(&self, mut inner: Box<dyn IndexInput>) -> Result<Box<dyn IndexInput>> {
        inner.seek(self.begin + self.file_pointer())?;
        Ok(Box::new(SlicedIndexInput {
            inner,
            begin: self.begin,
            len: self.len,
        }))
    }
}

impl Read for SlicedIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_bytes(buf).map_err(std::io::Error::from)
    }
}

impl DataInput for SlicedIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        if self.remaining() == 0 {
            return Err(PilumError::eof(format!(
                "Read past end of slice (length {})",
                self.len
            )));
        }
        self.inner.read_byte()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        self.inner.read_bytes(&mut buf[..want])
    }

    fn file_pointer(&self) -> u64 {
        self.inner.file_pointer() - self.begin
    }

    fn length(&self) -> u64 {
        self.len
    }
}

impl IndexInput for SlicedIndexInput {
    fn duplicate(&self) -> Result<Box<dyn IndexInput>> {
        self.rebound(self.inner.duplicate()?)
    }

    fn reopen(&self) -> Result<Box<dyn IndexInput>> {
        self.rebound(self.inner.reopen()?)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(PilumError::eof(format!(
                "Seek to {pos} beyond end of slice (length {})",
                self.len
            )));
        }
        self.inner.seek(self.begin + pos)
    }

    fn read_buffer(&mut self, size: usize, hint: BufferHint) -> Option<&[u8]> {
        if size as u64 > self.remaining() {
            return None;
        }
        self.inner.read_buffer(size, hint)
    }

    fn checksum(&mut self, len: u64) -> Result<u64> {
        let len = len.min(self.remaining());
        self.inner.checksum(len)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::storage::Directory;
    use crate::storage::data_io::DataOutput;
    use crate::storage::memory::MemoryDirectory;

    fn sliced(begin: u64, len: u64) -> SlicedIndexInput {
        let dir = MemoryDirectory::default();
        let mut out = dir.create_output("data").unwrap();
        let data: Vec<u8> = (0..64).collect();
        out.write_bytes(&data).unwrap();
        out.flush().unwrap();

        SlicedIndexInput::new(dir.open_input("data").unwrap(), begin, len).unwrap()
    }

    #[test]
    fn test_bounds_are_relative() {
        let mut slice = sliced(10, 5);
        assert_eq!(slice.length(), 5);
        assert_eq!(slice.file_pointer(), 0);

        let mut buf = [0u8; 16];
        assert_eq!(slice.read_bytes(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[10, 11, 12, 13, 14]);
        assert!(slice.eof());
        assert!(slice.read_byte().unwrap_err().is_eof());
    }

    #[test]
    fn test_seek_and_duplicate() {
        let mut slice = sliced(32, 16);
        slice.seek(4).unwrap();
        assert_eq!(slice.read_byte().unwrap(), 36);
        assert!(slice.seek(17).is_err());

        let mut dup = slice.duplicate().unwrap();
        assert_eq!(dup.file_pointer(), 5);
        assert_eq!(dup.length(), 16);
        assert_eq!(dup.read_byte().unwrap(), 37);
    }

    #[test]
    fn test_checksum_clamped_to_slice() {
        let mut slice = sliced(8, 8);
        let checksum = slice.checksum(100).unwrap();
        let expected: Vec<u8> = (8..16).collect();
        assert_eq!(checksum, crc32fast::hash(&expected) as u64);
        assert_eq!(slice.file_pointer(), 0);
    }

    #[test]
    fn test_out_of_range_slice() {
        let dir = MemoryDirectory::default();
        let mut out = dir.create_output("small").unwrap();
        out.write_bytes(b"abc").unwrap();
        out.close().unwrap();

        assert!(SlicedIndexInput::new(dir.open_input("small").unwrap(), 2, 5).is_err());
    }
}
