//! Skip list writer.

use log::trace;

use crate::error::{PilumError, Result};
use crate::lexical::skip_list::{SkipConfig, num_levels};
use crate::storage::data_io::DataOutput;

/// Lifecycle of a [`SkipWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Unprepared,
    Prepared,
    Flushed,
}

/// Accumulates skip records in per-level buffers and writes them out in one
/// piece once the postings list is complete.
#[derive(Debug)]
pub struct SkipWriter {
    skip_0: u64,
    skip_n: u64,
    levels: Vec<Vec<u8>>,
    num_levels: usize,
    state: WriterState,
}

impl SkipWriter {
    pub fn new(config: SkipConfig) -> Result<Self> {
        config.validate()?;
        Ok(SkipWriter {
            skip_0: config.skip_0,
            skip_n: config.skip_n,
            levels: Vec::new(),
            num_levels: 0,
            state: WriterState::Unprepared,
        })
    }

    pub fn skip_0(&self) -> u64 {
        self.skip_0
    }

    pub fn skip_n(&self) -> u64 {
        self.skip_n
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Levels allocated by the last [`SkipWriter::prepare`].
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Whether the producer must call [`SkipWriter::skip`] after `count` keys.
    pub fn is_skip_point(&self, count: u64) -> bool {
        count > 0 && count % self.skip_0 == 0
    }

    /// Size the writer for a list of `count` keys.
    pub fn prepare(&mut self, max_levels: usize, count: u64) {
        self.num_levels = num_levels(self.skip_0, self.skip_n, max_levels, count);
        if self.levels.len() < self.num_levels {
            self.levels.resize_with(self.num_levels, Vec::new);
        }
        for level in &mut self.levels {
            level.clear();
        }
        self.state = WriterState::Prepared;
        trace!(
            "Prepared skip writer: {count} keys, {} levels",
            self.num_levels
        );
    }

    /// Record a checkpoint after `count` keys.
    ///
    /// `count` must be a positive multiple of `skip_0`, increasing between
    /// calls. `write` is called once for level 0 and once for every higher
    /// level the checkpoint reaches, with that level's buffer.
    pub fn skip<F>(&mut self, count: u64, mut write: F) -> Result<()>
    where
        F: FnMut(usize, &mut dyn DataOutput) -> Result<()>,
    {
        if self.state != WriterState::Prepared {
            return Err(PilumError::invalid_operation(format!(
                "Skip writer is {:?}, expected Prepared",
                self.state
            )));
        }
        if count == 0 || self.num_levels == 0 {
            return Ok(());
        }

        let mut child = self.levels[0].len() as u64;
        write(0, &mut self.levels[0])?;

        let mut blocks = count / self.skip_0;
        for level in 1..self.num_levels {
            if blocks % self.skip_n != 0 {
                break;
            }
            blocks /= self.skip_n;

            let buffer = &mut self.levels[level];
            let offset = buffer.len() as u64;
            buffer.write_vlong(child)?;
            write(level, buffer)?;
            child = offset;
        }
        Ok(())
    }

    /// Write all non-empty levels, highest first.
    pub fn flush<O: DataOutput + ?Sized>(&mut self, out: &mut O) -> Result<()> {
        if self.state != WriterState::Prepared {
            return Err(PilumError::invalid_operation(format!(
                "Skip writer is {:?}, expected Prepared",
                self.state
            )));
        }

        let levels = &self.levels[..self.num_levels];
        let written = levels.iter().rev().skip_while(|level| level.is_empty());
        let count = written.clone().count();

        out.write_vint(count as u32)?;
        for level in written {
            out.write_vlong(level.len() as u64)?;
            out.write_bytes(level)?;
        }

        self.state = WriterState::Flushed;
        Ok(())
    }

    /// Forget all recorded checkpoints.
    pub fn reset(&mut self) {
        for level in &mut self.levels {
            level.clear();
        }
        self.num_levels = 0;
        self.state = WriterState::Unprepared;
    }
}
