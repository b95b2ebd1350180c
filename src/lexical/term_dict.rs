//! FST-backed term dictionary persisted in a [`Directory`].
//!
//! Each term maps to a [`TermInfo`] locating its postings. The infos are
//! varint-encoded into the FST payloads, so terms sharing a prefix and
//! similar postings offsets share payload bytes as well.
//!
//! File layout:
//!
//! ```text
//! [magic: fixed32][num_terms: vlong][fst][crc32 of everything before: fixed64]
//! ```

use std::ops::Bound;

use log::debug;

use crate::error::{PilumError, Result};
use crate::lexical::fst::{FstBuilder, FstStream, ImmutableFst};
use crate::storage::Directory;
use crate::storage::data_io::{DataInput, DataOutput, IndexInput};
use crate::util::varint;

/// Identifies a term dictionary file.
pub const TERM_DICT_MAGIC: u32 = 0x5054_4431;

const FOOTER_SIZE: u64 = 8;

/// Where a term's postings live and how often the term occurs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermInfo {
    pub postings_offset: u64,
    pub skip_offset: u64,
    pub doc_freq: u32,
    pub total_term_freq: u64,
}

impl TermInfo {
    /// Append the varint encoding of this info to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        varint::write_u64(out, self.postings_offset)?;
        varint::write_u64(out, self.skip_offset)?;
        varint::write_u32(out, self.doc_freq)?;
        varint::write_u64(out, self.total_term_freq)?;
        Ok(())
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        let reader = &mut bytes;
        let info = TermInfo {
            postings_offset: varint::read_u64(reader)?,
            skip_offset: varint::read_u64(reader)?,
            doc_freq: varint::read_u32(reader)?,
            total_term_freq: varint::read_u64(reader)?,
        };
        if !bytes.is_empty() {
            return Err(PilumError::corruption(format!(
                "{} trailing bytes after term info",
                bytes.len()
            )));
        }
        Ok(info)
    }
}

/// Collects terms in sorted order and writes them as one dictionary file.
#[derive(Debug, Default)]
pub struct TermDictionaryWriter {
    builder: FstBuilder,
    last_term: Option<Vec<u8>>,
    scratch: Vec<u8>,
}

impl TermDictionaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    /// Add a term. Terms must arrive in strictly increasing byte order.
    pub fn add(&mut self, term: &[u8], info: &TermInfo) -> Result<()> {
        if let Some(last) = &self.last_term {
            if term <= last.as_slice() {
                return Err(PilumError::invalid_operation(format!(
                    "Term {:?} added after {:?}",
                    String::from_utf8_lossy(term),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        self.scratch.clear();
        info.encode(&mut self.scratch)?;
        self.builder.insert(term, &self.scratch);

        match &mut self.last_term {
            Some(last) => {
                last.clear();
                last.extend_from_slice(term);
            }
            None => self.last_term = Some(term.to_vec()),
        }
        Ok(())
    }

    /// Build the FST and write it to `name` in `directory`.
    pub fn finish(self, directory: &dyn Directory, name: &str) -> Result<TermDictionary> {
        let num_terms = self.builder.len();
        let (fst, stats) = self.builder.finish();

        let mut out = directory.create_output(name)?;
        out.write_fixed32(TERM_DICT_MAGIC)?;
        out.write_vlong(num_terms as u64)?;
        fst.write(&mut *out)?;
        let checksum = out.checksum();
        out.write_fixed64(checksum)?;
        out.close()?;

        debug!(
            "Wrote term dictionary {name}: {num_terms} terms, {} states, {} arcs, {} weight bytes",
            stats.num_states, stats.num_arcs, stats.total_weight_size
        );
        Ok(TermDictionary { fst, num_terms })
    }
}

/// A read-only term dictionary.
#[derive(Debug, Clone)]
pub struct TermDictionary {
    fst: ImmutableFst,
    num_terms: usize,
}

impl TermDictionary {
    /// Open `name`, verifying its checksum footer.
    pub fn open(directory: &dyn Directory, name: &str) -> Result<Self> {
        let mut input = directory.open_input(name)?;
        Self::read(&mut *input, name)
    }

    fn read(input: &mut dyn IndexInput, name: &str) -> Result<Self> {
        let length = input.length();
        if length < 4 + 1 + FOOTER_SIZE {
            return Err(PilumError::corruption(format!(
                "Term dictionary {name} is too short ({length} bytes)"
            )));
        }

        let body = length - FOOTER_SIZE;
        input.seek(0)?;
        let actual = input.checksum(body)?;
        input.seek(body)?;
        let expected = input.read_fixed64()?;
        if actual != expected {
            return Err(PilumError::corruption(format!(
                "Term dictionary {name} checksum mismatch: \
                 stored {expected:#010x}, computed {actual:#010x}"
            )));
        }

        input.seek(0)?;
        let magic = input.read_fixed32()?;
        if magic != TERM_DICT_MAGIC {
            return Err(PilumError::format(format!(
                "{name} is not a term dictionary (magic {magic:#010x})"
            )));
        }
        let num_terms = input.read_vlong()? as usize;
        let fst = ImmutableFst::read(input)?;

        debug!("Opened term dictionary {name}: {num_terms} terms");
        Ok(TermDictionary { fst, num_terms })
    }

    pub fn len(&self) -> usize {
        self.num_terms
    }

    pub fn is_empty(&self) -> bool {
        self.num_terms == 0
    }

    pub fn fst(&self) -> &ImmutableFst {
        &self.fst
    }

    pub fn get(&self, term: &[u8]) -> Result<Option<TermInfo>> {
        self.fst
            .get(term)
            .map(|payload| TermInfo::decode(&payload))
            .transpose()
    }

    pub fn contains(&self, term: &[u8]) -> bool {
        self.fst.contains(term)
    }

    /// All terms in order.
    pub fn terms(&self) -> TermStream<'_> {
        TermStream {
            inner: self.fst.stream(),
        }
    }

    /// Terms starting with `prefix`, in order.
    pub fn prefix(&self, prefix: &[u8]) -> TermStream<'_> {
        TermStream {
            inner: self.fst.prefix(prefix),
        }
    }

    /// Terms within the given bounds, in order.
    pub fn range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> TermStream<'_> {
        TermStream {
            inner: self.fst.range(lower, upper),
        }
    }
}

/// Iterator over `(term, info)` pairs of a [`TermDictionary`].
#[derive(Debug)]
pub struct TermStream<'a> {
    inner: FstStream<'a>,
}

impl Iterator for TermStream<'_> {
    type Item = Result<(Vec<u8>, TermInfo)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (term, payload) = self.inner.next()?;
        Some(TermInfo::decode(&payload).map(|info| (term, info)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::storage::memory::MemoryDirectory;

    fn info(n: u64) -> TermInfo {
        TermInfo {
            postings_offset: n * 100,
            skip_offset: n * 100 + 40,
            doc_freq: n as u32 + 1,
            total_term_freq: n * 3 + 1,
        }
    }

    fn write(dir: &MemoryDirectory, terms: &[&str]) -> TermDictionary {
        let mut writer = TermDictionaryWriter::new();
        for (i, term) in terms.iter().enumerate() {
            writer.add(term.as_bytes(), &info(i as u64)).unwrap();
        }
        writer.finish(dir, "terms.dict").unwrap()
    }

    #[test]
    fn test_term_info_encoding() {
        let mut bytes = Vec::new();
        info(7).encode(&mut bytes).unwrap();
        assert_eq!(TermInfo::decode(&bytes).unwrap(), info(7));

        bytes.push(0);
        assert!(matches!(
            TermInfo::decode(&bytes),
            Err(PilumError::Corruption(_))
        ));
        assert!(TermInfo::decode(&[0x80]).is_err());
    }

    #[test]
    fn test_write_and_open() {
        let dir = MemoryDirectory::default();
        let terms = ["apple", "apply", "banana", "band", "bandana"];
        let written = write(&dir, &terms);
        assert_eq!(written.len(), terms.len());

        let dict = TermDictionary::open(&dir, "terms.dict").unwrap();
        assert_eq!(dict.len(), terms.len());
        for (i, term) in terms.iter().enumerate() {
            assert_eq!(dict.get(term.as_bytes()).unwrap(), Some(info(i as u64)));
        }
        assert_eq!(dict.get(b"ban").unwrap(), None);
        assert!(dict.contains(b"band"));
        assert_eq!(dict.fst(), written.fst());

        let band: Vec<Vec<u8>> = dict
            .prefix(b"band")
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(band, vec![b"band".to_vec(), b"bandana".to_vec()]);
    }

    #[test]
    fn test_out_of_order_terms_rejected() {
        let mut writer = TermDictionaryWriter::new();
        writer.add(b"b", &info(0)).unwrap();
        assert!(writer.add(b"a", &info(1)).is_err());
        assert!(writer.add(b"b", &info(1)).is_err());
        writer.add(b"c", &info(1)).unwrap();
        assert_eq!(writer.len(), 2);
    }

    #[test]
    fn test_empty_dictionary() {
        let dir = MemoryDirectory::default();
        let written = write(&dir, &[]);
        assert!(written.is_empty());

        let dict = TermDictionary::open(&dir, "terms.dict").unwrap();
        assert!(dict.is_empty());
        assert_eq!(dict.terms().count(), 0);
    }

    #[test]
    fn test_checksum_mismatch() {
        let dir = MemoryDirectory::default();
        write(&dir, &["alpha", "beta"]);

        let mut input = dir.open_input("terms.dict").unwrap();
        let mut bytes = vec![0u8; input.length() as usize];
        input.read_exact_bytes(&mut bytes).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let mut out = dir.create_output("terms.dict").unwrap();
        out.write_bytes(&bytes).unwrap();
        out.flush().unwrap();
        out.close().unwrap();

        let err = TermDictionary::open(&dir, "terms.dict").unwrap_err();
        assert!(matches!(err, PilumError::Corruption(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = MemoryDirectory::default();
        let err = TermDictionary::open(&dir, "nope").unwrap_err();
        assert!(matches!(err, PilumError::NotFound(_)));
    }
}
