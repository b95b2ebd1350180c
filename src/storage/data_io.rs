//! Byte stream interfaces shared by every directory backend.
//!
//! [`DataInput`] and [`DataOutput`] are sequential cursors with typed
//! helpers layered over the codecs in [`crate::util`]. [`IndexInput`] adds
//! random access, cursor duplication and range checksums; [`IndexOutput`]
//! adds a rolling checksum and an explicit close.

use std::fmt::Debug;
use std::io::{Read, Write};

use crate::error::{PilumError, Result};
use crate::util::bytes_io::{read_fixed, write_fixed};
use crate::util::varint;

/// How long a slice returned by [`IndexInput::read_buffer`] must stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferHint {
    /// Valid until the next mutating call on the stream.
    #[default]
    Normal,
    /// Valid for the lifetime of the underlying storage.
    Persistent,
}

/// A sequential byte source.
///
/// `read_bytes` returns a short count at end of stream instead of failing;
/// every typed helper fails with [`PilumError::Eof`] when the stream ends
/// before the value is complete.
pub trait DataInput: Read + Send + Debug {
    /// Read a single byte.
    fn read_byte(&mut self) -> Result<u8>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Current read position.
    fn file_pointer(&self) -> u64;

    /// Total length of the stream.
    fn length(&self) -> u64;

    /// Whether the cursor is at or past the end of the stream.
    fn eof(&self) -> bool {
        self.file_pointer() >= self.length()
    }

    /// Fill `buf` completely or fail with EOF.
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let read = self.read_bytes(buf)?;
        if read < buf.len() {
            return Err(PilumError::eof(format!(
                "Wanted {} bytes, stream ended after {read}",
                buf.len()
            )));
        }
        Ok(())
    }

    fn read_fixed16(&mut self) -> Result<u16> {
        read_fixed(self)
    }

    fn read_fixed32(&mut self) -> Result<u32> {
        read_fixed(self)
    }

    fn read_fixed64(&mut self) -> Result<u64> {
        read_fixed(self)
    }

    fn read_vint(&mut self) -> Result<u32> {
        varint::read_u32(self)
    }

    fn read_vlong(&mut self) -> Result<u64> {
        varint::read_u64(self)
    }

    /// Read a zig-zag encoded signed 32-bit varint.
    fn read_zvint(&mut self) -> Result<i32> {
        varint::read_u32(self).map(varint::zigzag_decode_32)
    }

    /// Read a zig-zag encoded signed 64-bit varint.
    fn read_zvlong(&mut self) -> Result<i64> {
        varint::read_u64(self).map(varint::zigzag_decode_64)
    }

    /// Read a varint length followed by that many bytes.
    fn read_bytes_vec(&mut self) -> Result<Vec<u8>> {
        let len = self.read_vlong()?;
        let remaining = self.length().saturating_sub(self.file_pointer());
        if len > remaining {
            return Err(PilumError::eof(format!(
                "Byte string of {len} bytes exceeds the {remaining} remaining"
            )));
        }
        let mut data = vec![0u8; len as usize];
        self.read_exact_bytes(&mut data)?;
        Ok(data)
    }

    /// Read a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String> {
        let data = self.read_bytes_vec()?;
        String::from_utf8(data).map_err(|e| PilumError::corruption(format!("Invalid UTF-8: {e}")))
    }
}

/// A random-access [`DataInput`].
pub trait IndexInput: DataInput {
    /// An independent cursor over the same storage, at the same offset.
    ///
    /// Must not be called concurrently with use of `self`.
    fn duplicate(&self) -> Result<Box<dyn IndexInput>>;

    /// Like [`IndexInput::duplicate`], but the new handle may be created
    /// while `self` is in use on another thread.
    fn reopen(&self) -> Result<Box<dyn IndexInput>>;

    /// Move the cursor to `pos`. Seeking past [`DataInput::length`] fails.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Zero-copy access to the next `size` bytes.
    ///
    /// Returns `None` when the implementation cannot serve the request
    /// without copying; the caller then falls back to
    /// [`DataInput::read_bytes`]. On success the cursor advances by `size`.
    fn read_buffer(&mut self, size: usize, hint: BufferHint) -> Option<&[u8]>;

    /// CRC32 of `[file_pointer, file_pointer + len)`, clamped to the end of
    /// the stream. The cursor position is unchanged.
    fn checksum(&mut self, len: u64) -> Result<u64> {
        let pos = self.file_pointer();
        let end = pos.saturating_add(len).min(self.length());

        let mut hasher = crc32fast::Hasher::new();
        let mut chunk = [0u8; 1024];
        let mut remaining = end - pos;
        while remaining > 0 {
            let want = remaining.min(chunk.len() as u64) as usize;
            let read = self.read_bytes(&mut chunk[..want])?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read]);
            remaining -= read as u64;
        }

        self.seek(pos)?;
        Ok(hasher.finalize() as u64)
    }
}

/// A sequential byte sink.
pub trait DataOutput: Write + Send + Debug {
    /// Write a single byte.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Write all of `data`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Number of bytes written so far.
    fn file_pointer(&self) -> u64;

    fn write_fixed16(&mut self, value: u16) -> Result<()> {
        write_fixed(self, value)
    }

    fn write_fixed32(&mut self, value: u32) -> Result<()> {
        write_fixed(self, value)
    }

    fn write_fixed64(&mut self, value: u64) -> Result<()> {
        write_fixed(self, value)
    }

    fn write_vint(&mut self, value: u32) -> Result<()> {
        varint::write_u32(self, value).map(|_| ())
    }

    fn write_vlong(&mut self, value: u64) -> Result<()> {
        varint::write_u64(self, value).map(|_| ())
    }

    fn write_zvint(&mut self, value: i32) -> Result<()> {
        self.write_vint(varint::zigzag_encode_32(value))
    }

    fn write_zvlong(&mut self, value: i64) -> Result<()> {
        self.write_vlong(varint::zigzag_encode_64(value))
    }

    /// Write a varint length followed by the bytes.
    fn write_bytes_vec(&mut self, data: &[u8]) -> Result<()> {
        self.write_vlong(data.len() as u64)?;
        self.write_bytes(data)
    }

    /// Write a length-prefixed UTF-8 string.
    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes_vec(value.as_bytes())
    }
}

/// A [`DataOutput`] bound to a directory file.
pub trait IndexOutput: DataOutput {
    /// CRC32 over every byte written so far, including bytes still buffered.
    ///
    /// Repeated calls without intervening writes return the same value.
    fn checksum(&self) -> u64;

    /// Flush buffered bytes and release the stream. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl DataOutput for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.len() as u64
    }
}
