//! Skip list reader.

use log::trace;

use crate::error::{PilumError, Result};
use crate::lexical::DocId;
use crate::lexical::skip_list::{SkipConfig, level_step};
use crate::storage::data_io::{DataInput, IndexInput};
use crate::storage::slice::SlicedIndexInput;

/// Lifecycle of a [`SkipReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unprepared,
    Prepared,
}

/// Cursor over one level of a serialized skip list.
#[derive(Debug)]
struct Level {
    stream: SlicedIndexInput,
    /// Level number as seen by the callbacks, 0 being the densest.
    id: usize,
    /// Keys covered by one record.
    step: u64,
    /// Keys covered by the records consumed so far.
    skipped: u64,
    /// Child pointer of the last consumed record.
    child: u64,
    /// Key and child pointer of the next record, once decoded.
    pending: Option<(DocId, u64)>,
    /// The stream ran out and `pending` holds the callback's sentinel.
    exhausted: bool,
}

impl Level {
    fn rewind(&mut self) -> Result<()> {
        self.stream.seek(0)?;
        self.skipped = 0;
        self.child = 0;
        self.pending = None;
        self.exhausted = false;
        Ok(())
    }

    /// Decode the next record unless one is already pending.
    fn load<F>(&mut self, read: &mut F) -> Result<(DocId, u64)>
    where
        F: FnMut(usize, &mut dyn IndexInput) -> Result<DocId>,
    {
        if let Some(pending) = self.pending {
            return Ok(pending);
        }

        let record = if self.stream.eof() {
            // Let the callback produce its end-of-list sentinel.
            self.exhausted = true;
            (read(self.id, &mut self.stream)?, 0)
        } else {
            let child = if self.id > 0 {
                self.stream.read_vlong()?
            } else {
                0
            };
            (read(self.id, &mut self.stream)?, child)
        };

        self.pending = Some(record);
        Ok(record)
    }
}

/// Fast-forwards through a postings list using the levels written by
/// [`super::SkipWriter`].
///
/// The cursor only moves forward: seeking to a target below the last one
/// reached is a no-op until [`SkipReader::reset`] is called.
#[derive(Debug)]
pub struct SkipReader {
    skip_0: u64,
    skip_n: u64,
    /// Highest level first.
    levels: Vec<Level>,
    state: ReaderState,
}

impl SkipReader {
    pub fn new(config: SkipConfig) -> Result<Self> {
        config.validate()?;
        Ok(SkipReader {
            skip_0: config.skip_0,
            skip_n: config.skip_n,
            levels: Vec::new(),
            state: ReaderState::Unprepared,
        })
    }

    pub fn skip_0(&self) -> u64 {
        self.skip_0
    }

    pub fn skip_n(&self) -> u64 {
        self.skip_n
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Read the level directory at the cursor of `input`.
    ///
    /// Each level gets its own bounded duplicate of `input`; on return
    /// `input` is positioned just past the skip data.
    pub fn prepare(&mut self, input: &mut dyn IndexInput) -> Result<()> {
        let count = input.read_vint()? as usize;

        let mut levels = Vec::with_capacity(count);
        for i in 0..count {
            let len = input.read_vlong()?;
            let begin = input.file_pointer();
            let id = count - 1 - i;

            levels.push(Level {
                stream: SlicedIndexInput::new(input.duplicate()?, begin, len)?,
                id,
                step: level_step(self.skip_0, self.skip_n, id),
                skipped: 0,
                child: 0,
                pending: None,
                exhausted: false,
            });
            input.seek(begin + len)?;
        }

        trace!("Prepared skip reader with {count} levels");
        self.levels = levels;
        self.state = ReaderState::Prepared;
        Ok(())
    }

    /// Advance every level to the last record whose key is below `target`.
    ///
    /// Returns the number of keys those records cover, i.e. the position
    /// the postings reader may jump to. `read` decodes a record payload
    /// into its key; once a level is exhausted it is called one final time
    /// with a stream at EOF and should return a sentinel such as
    /// [`crate::lexical::doc_limits::eof`].
    pub fn seek<F>(&mut self, target: DocId, mut read: F) -> Result<u64>
    where
        F: FnMut(usize, &mut dyn IndexInput) -> Result<DocId>,
    {
        if self.state != ReaderState::Prepared {
            return Err(PilumError::invalid_operation(
                "Skip reader used before prepare",
            ));
        }

        let mut upper: Option<(u64, u64)> = None;
        for level in &mut self.levels {
            if let Some((up_skipped, up_child)) = upper {
                if up_skipped > level.skipped + level.step {
                    // The level above jumped past this one.
                    level.stream.seek(up_child)?;
                    level.skipped = up_skipped - level.step;
                    level.pending = None;
                    level.exhausted = false;
                }
            }

            loop {
                let (key, child) = level.load(&mut read)?;
                if level.exhausted || key >= target {
                    break;
                }
                level.skipped += level.step;
                level.child = child;
                level.pending = None;
            }

            upper = Some((level.skipped, level.child));
        }

        Ok(upper.map_or(0, |(skipped, _)| skipped))
    }

    /// Rewind every level to before its first record.
    pub fn reset(&mut self) -> Result<()> {
        for level in &mut self.levels {
            level.rewind()?;
        }
        Ok(())
    }
}
