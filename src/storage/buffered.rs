//! Buffered stream adapters.
//!
//! A backend only has to provide positional reads ([`BufferedSource`]) or
//! appends ([`BufferedSink`]); [`BufferedIndexInput`] and
//! [`BufferedIndexOutput`] batch the small typed reads and writes of the
//! codec layer into few calls on the backend.

use std::fmt::Debug;
use std::io::{Read, Write};

use crc32fast::Hasher;

use crate::error::{PilumError, Result};
use crate::storage::data_io::{BufferHint, DataInput, DataOutput, IndexInput, IndexOutput};

/// Default scratch buffer size for buffered streams.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Positional reads against a backing store.
pub trait BufferedSource: Send + Debug + Sized + 'static {
    /// Read up to `buf.len()` bytes starting at `pos`.
    fn read_internal(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize>;

    /// Length of the underlying data.
    fn length(&self) -> u64;

    /// A second handle sharing the same backing resource.
    fn duplicate(&self) -> Result<Self>;

    /// A second handle that may be created concurrently with use of `self`.
    fn reopen(&self) -> Result<Self>;
}

/// Appends to a backing store.
pub trait BufferedSink: Send + Debug {
    /// Append `data` to the backing store.
    fn write_internal(&mut self, data: &[u8]) -> Result<()>;

    /// Make appended data durable or visible to new readers.
    fn flush_internal(&mut self) -> Result<()>;
}

/// An [`IndexInput`] reading through a fixed-size scratch window.
///
/// The window holds `buf[..end]`, which mirrors the file range
/// `[start, start + end)`; the cursor is at `start + begin`.
#[derive(Debug)]
pub struct BufferedIndexInput<S: BufferedSource> {
    source: S,
    buf: Box<[u8]>,
    begin: usize,
    end: usize,
    start: u64,
}

impl<S: BufferedSource> BufferedIndexInput<S> {
    pub fn new(source: S, buffer_size: usize) -> Self {
        BufferedIndexInput {
            source,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            begin: 0,
            end: 0,
            start: 0,
        }
    }

    /// Size of the scratch window.
    pub fn buffer_size(&self) -> usize {
        self.buf.len()
    }

    /// Bytes available in the window without touching the source.
    pub fn buffered(&self) -> usize {
        self.end - self.begin
    }

    /// Borrow the backing source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Replace the window with the bytes at the cursor using exactly one
    /// source read.
    fn refill(&mut self) -> Result<()> {
        let pos = self.start + self.begin as u64;
        let length = self.source.length();
        let size = length.saturating_sub(pos).min(self.buf.len() as u64) as usize;
        if size == 0 {
            return Err(PilumError::eof(format!(
                "Read past end of stream at {pos} (length {length})"
            )));
        }

        let read = self.source.read_internal(pos, &mut self.buf[..size])?;
        if read == 0 {
            return Err(PilumError::eof(format!(
                "Source returned no data at {pos} (length {length})"
            )));
        }

        self.start = pos;
        self.begin = 0;
        self.end = read;
        Ok(())
    }

    fn copy_from_window(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.end - self.begin);
        out[..n].copy_from_slice(&self.buf[self.begin..self.begin + n]);
        self.begin += n;
        n
    }

    /// Read straight into `out`, leaving an empty window at the new cursor.
    fn read_direct(&mut self, out: &mut [u8]) -> Result<usize> {
        let pos = self.start + self.begin as u64;
        let available = self.source.length().saturating_sub(pos);
        let want = (out.len() as u64).min(available) as usize;

        let mut read = 0;
        while read < want {
            let n = self
                .source
                .read_internal(pos + read as u64, &mut out[read..want])?;
            if n == 0 {
                break;
            }
            read += n;
        }

        self.start = pos + read as u64;
        self.begin = 0;
        self.end = 0;
        Ok(read)
    }

    fn with_source(&self, source: S) -> Self {
        BufferedIndexInput {
            source,
            buf: self.buf.clone(),
            begin: self.begin,
            end: self.end,
            start: self.start,
        }
    }
}

impl<S: BufferedSource> Read for BufferedIndexInput<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_bytes(buf).map_err(std::io::Error::from)
    }
}

impl<S: BufferedSource> DataInput for BufferedIndexInput<S> {
    fn read_byte(&mut self) -> Result<u8> {
        if self.begin == self.end {
            self.refill()?;
        }
        let byte = self.buf[self.begin];
        self.begin += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut copied = self.copy_from_window(out);
        // Sources may return short reads, so keep going until `out` is full.
        while copied < out.len() && !self.eof() {
            let rest = &mut out[copied..];
            if rest.len() >= self.buf.len() {
                copied += self.read_direct(rest)?;
                break;
            }
            match self.refill() {
                Ok(()) => copied += self.copy_from_window(rest),
                Err(e) if e.is_eof() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(copied)
    }

    fn file_pointer(&self) -> u64 {
        self.start + self.begin as u64
    }

    fn length(&self) -> u64 {
        self.source.length()
    }
}

impl<S: BufferedSource> IndexInput for BufferedIndexInput<S> {
    fn duplicate(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(self.with_source(self.source.duplicate()?)))
    }

    fn reopen(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(self.with_source(self.source.reopen()?)))
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        let length = self.source.length();
        if pos > length {
            return Err(PilumError::eof(format!(
                "Seek to {pos} beyond end of stream (length {length})"
            )));
        }

        if pos >= self.start && pos <= self.start + self.end as u64 {
            self.begin = (pos - self.start) as usize;
        } else {
            self.start = pos;
            self.begin = 0;
            self.end = 0;
        }
        Ok(())
    }

    fn read_buffer(&mut self, size: usize, hint: BufferHint) -> Option<&[u8]> {
        // The window is overwritten by the next refill.
        if hint == BufferHint::Persistent || self.end - self.begin < size {
            return None;
        }
        let begin = self.begin;
        self.begin += size;
        Some(&self.buf[begin..begin + size])
    }
}

/// An [`IndexOutput`] that batches writes through a scratch buffer and
/// keeps a rolling CRC32 of everything flushed.
///
/// A failed flush poisons the stream: later writes fail instead of silently
/// dropping the bytes that were lost.
pub struct BufferedIndexOutput<S: BufferedSink> {
    sink: S,
    buf: Vec<u8>,
    buffer_size: usize,
    start: u64,
    crc: Hasher,
    poisoned: bool,
    closed: bool,
}

impl<S: BufferedSink> Debug for BufferedIndexOutput<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedIndexOutput")
            .field("sink", &self.sink)
            .field("buffered", &self.buf.len())
            .field("buffer_size", &self.buffer_size)
            .field("start", &self.start)
            .field("poisoned", &self.poisoned)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<S: BufferedSink> BufferedIndexOutput<S> {
    pub fn new(sink: S, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        BufferedIndexOutput {
            sink,
            buf: Vec::with_capacity(buffer_size),
            buffer_size,
            start: 0,
            crc: Hasher::new(),
            poisoned: false,
            closed: false,
        }
    }

    /// Whether a previous flush failed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.closed {
            return Err(PilumError::invalid_operation("Output is closed"));
        }
        if self.poisoned {
            return Err(PilumError::invalid_operation(
                "Output failed a previous flush",
            ));
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.sink.write_internal(&self.buf) {
            self.poisoned = true;
            return Err(e);
        }
        self.crc.update(&self.buf);
        self.start += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.flush_buffer()?;
        if let Err(e) = self.sink.flush_internal() {
            self.poisoned = true;
            return Err(e);
        }
        Ok(())
    }
}

impl<S: BufferedSink> Write for BufferedIndexOutput<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_bytes(buf).map_err(std::io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_all().map_err(std::io::Error::from)
    }
}

impl<S: BufferedSink> DataOutput for BufferedIndexOutput<S> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.ensure_writable()?;
        if self.buf.len() >= self.buffer_size {
            self.flush_buffer()?;
        }
        self.buf.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        if self.buf.len() + data.len() > self.buffer_size {
            self.flush_buffer()?;
        }

        if data.len() >= self.buffer_size {
            if let Err(e) = self.sink.write_internal(data) {
                self.poisoned = true;
                return Err(e);
            }
            self.crc.update(data);
            self.start += data.len() as u64;
        } else {
            self.buf.extend_from_slice(data);
        }
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.start + self.buf.len() as u64
    }
}

impl<S: BufferedSink> IndexOutput for BufferedIndexOutput<S> {
    fn checksum(&self) -> u64 {
        let mut crc = self.crc.clone();
        crc.update(&self.buf);
        crc.finalize() as u64
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush_all()?;
        self.closed = true;
        Ok(())
    }
}

impl<S: BufferedSink> Drop for BufferedIndexOutput<S> {
    fn drop(&mut self) {
        if !self.closed && !self.poisoned {
            if let Err(e) = self.close() {
                log::warn!("Failed to close output on drop: {e}");
            }
        }
    }
}
