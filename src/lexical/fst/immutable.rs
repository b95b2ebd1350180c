//! Flat-array FST representation and its serialized form.
//!
//! Layout, all integers big-endian or varint:
//!
//! ```text
//! [version: u8][properties: i64][total_weight_bytes: i64]
//! [start: vint][num_states: vint][num_arcs: vint]
//! per state:  [arc_count: vint][final_len + 1: vlong, 0 = not final]
//!   per arc:  [label: u8][next: vint][weight_len: vlong]
//! [weights: total_weight_bytes]
//! ```
//!
//! The weights blob holds, per state in id order, the final weight followed
//! by the weights of its arcs in label order.

use std::io::{Read, Write};
use std::ops::Bound;

use byteorder::{ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::error::{PilumError, Result};
use crate::lexical::fst::stream::FstStream;
use crate::lexical::fst::{FST_VERSION, StateId};
use crate::util::bytes_io::{read_fixed, write_fixed};
use crate::util::varint;

/// A byte range inside the weights blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateEntry {
    pub(crate) arc_offset: usize,
    pub(crate) arc_count: usize,
    pub(crate) final_weight: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArcEntry {
    pub(crate) label: u8,
    pub(crate) next: StateId,
    pub(crate) weight: Span,
}

/// One outgoing arc of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FstArc<'a> {
    pub label: u8,
    pub next: StateId,
    pub weight: &'a [u8],
}

/// A read-only FST over byte labels with byte-string weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutableFst {
    pub(crate) start: StateId,
    pub(crate) properties: u64,
    pub(crate) states: Vec<StateEntry>,
    pub(crate) arcs: Vec<ArcEntry>,
    pub(crate) weights: Vec<u8>,
}

impl ImmutableFst {
    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn properties(&self) -> u64 {
        self.properties
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Total bytes of all final and arc weights.
    pub fn total_weight_size(&self) -> usize {
        self.weights.len()
    }

    /// Final weight of `state`, or `None` if it does not accept.
    pub fn final_weight(&self, state: StateId) -> Option<&[u8]> {
        let span = self.states.get(state as usize)?.final_weight?;
        Some(self.span(span))
    }

    pub fn is_final(&self, state: StateId) -> bool {
        self.final_weight(state).is_some()
    }

    /// Number of arcs leaving `state`.
    pub fn num_arcs_of(&self, state: StateId) -> usize {
        self.states
            .get(state as usize)
            .map_or(0, |entry| entry.arc_count)
    }

    /// Arcs leaving `state`, sorted by label.
    pub fn arcs(&self, state: StateId) -> impl ExactSizeIterator<Item = FstArc<'_>> + '_ {
        self.arc_entries(state)
            .iter()
            .map(move |arc| self.to_arc(arc))
    }

    /// The `index`-th arc leaving `state`.
    pub fn arc(&self, state: StateId, index: usize) -> Option<FstArc<'_>> {
        self.arc_entries(state)
            .get(index)
            .map(|arc| self.to_arc(arc))
    }

    /// Payload of `key`: the arc weights along its path followed by the
    /// final weight of the state it ends in.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.start;
        let mut output = Vec::new();
        for &label in key {
            let arcs = self.arc_entries(state);
            let idx = arcs.binary_search_by_key(&label, |arc| arc.label).ok()?;
            let arc = &arcs[idx];
            output.extend_from_slice(self.span(arc.weight));
            state = arc.next;
        }
        output.extend_from_slice(self.final_weight(state)?);
        Some(output)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All entries in key order.
    pub fn stream(&self) -> FstStream<'_> {
        FstStream::new(self, self.start, Vec::new(), Vec::new(), Bound::Unbounded, Bound::Unbounded)
    }

    /// Entries whose keys fall within the given bounds, in key order.
    pub fn range(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> FstStream<'_> {
        FstStream::new(
            self,
            self.start,
            Vec::new(),
            Vec::new(),
            lower.map(<[u8]>::to_vec),
            upper.map(<[u8]>::to_vec),
        )
    }

    /// Entries whose keys start with `prefix`, in key order.
    pub fn prefix(&self, prefix: &[u8]) -> FstStream<'_> {
        let mut state = self.start;
        let mut output = Vec::new();
        for &label in prefix {
            let arcs = self.arc_entries(state);
            match arcs.binary_search_by_key(&label, |arc| arc.label) {
                Ok(idx) => {
                    output.extend_from_slice(self.span(arcs[idx].weight));
                    state = arcs[idx].next;
                }
                Err(_) => return FstStream::empty(self),
            }
        }
        FstStream::new(
            self,
            state,
            prefix.to_vec(),
            output,
            Bound::Unbounded,
            Bound::Unbounded,
        )
    }

    /// Serialize into `writer`.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(FST_VERSION)?;
        write_fixed(writer, self.properties as i64)?;
        write_fixed(writer, self.weights.len() as i64)?;
        varint::write_u32(writer, self.start)?;
        varint::write_u32(writer, self.states.len() as u32)?;
        varint::write_u32(writer, self.arcs.len() as u32)?;

        for state in &self.states {
            varint::write_u32(writer, state.arc_count as u32)?;
            let final_len = state.final_weight.map_or(0, |span| span.len as u64 + 1);
            varint::write_u64(writer, final_len)?;
            for arc in &self.arcs[state.arc_offset..state.arc_offset + state.arc_count] {
                writer.write_u8(arc.label)?;
                varint::write_u32(writer, arc.next)?;
                varint::write_u64(writer, arc.weight.len as u64)?;
            }
        }

        writer.write_all(&self.weights)?;
        Ok(())
    }

    /// Deserialize an FST written by [`ImmutableFst::write`].
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u8()?;
        if version != FST_VERSION {
            return Err(PilumError::format(format!(
                "Unsupported FST version {version}, expected {FST_VERSION}"
            )));
        }

        let properties = read_fixed::<i64, _>(reader)? as u64;
        let total_weights = read_fixed::<i64, _>(reader)?;
        let total_weights = u64::try_from(total_weights).map_err(|_| {
            PilumError::corruption(format!("Negative FST weight size {total_weights}"))
        })?;
        let start = varint::read_u32(reader)?;
        let num_states = varint::read_u32(reader)? as usize;
        let num_arcs = varint::read_u32(reader)? as usize;

        if start as usize >= num_states.max(1) {
            return Err(PilumError::corruption(format!(
                "FST start state {start} out of {num_states} states"
            )));
        }

        // Counts come from the stream; let the vectors grow as records arrive.
        let mut states = Vec::with_capacity(num_states.min(1 << 16));
        let mut arcs = Vec::with_capacity(num_arcs.min(1 << 16));
        let mut offset = 0usize;

        for _ in 0..num_states {
            let arc_count = varint::read_u32(reader)? as usize;
            let final_len = varint::read_u64(reader)?;
            let final_weight = match final_len {
                0 => None,
                n => {
                    let span = Span {
                        offset,
                        len: (n - 1) as usize,
                    };
                    offset = offset.saturating_add(span.len);
                    Some(span)
                }
            };

            let arc_offset = arcs.len();
            for _ in 0..arc_count {
                let label = reader.read_u8()?;
                let next = varint::read_u32(reader)?;
                if next as usize >= num_states {
                    return Err(PilumError::corruption(format!(
                        "FST arc target {next} out of {num_states} states"
                    )));
                }
                let len = varint::read_u64(reader)? as usize;
                arcs.push(ArcEntry {
                    label,
                    next,
                    weight: Span { offset, len },
                });
                offset = offset.saturating_add(len);
            }

            states.push(StateEntry {
                arc_offset,
                arc_count,
                final_weight,
            });
        }

        if arcs.len() != num_arcs {
            return Err(PilumError::corruption(format!(
                "FST declares {num_arcs} arcs but holds {}",
                arcs.len()
            )));
        }
        if offset as u64 != total_weights {
            return Err(PilumError::corruption(format!(
                "FST weights cover {offset} bytes but {total_weights} are declared"
            )));
        }

        let mut weights = Vec::new();
        Read::take(&mut *reader, total_weights).read_to_end(&mut weights)?;
        if weights.len() as u64 != total_weights {
            return Err(PilumError::eof(format!(
                "FST weights truncated: {} of {total_weights} bytes",
                weights.len()
            )));
        }

        if states.is_empty() {
            states.push(StateEntry {
                arc_offset: 0,
                arc_count: 0,
                final_weight: None,
            });
        }

        debug!(
            "Read FST: {} states, {} arcs, {} weight bytes",
            states.len(),
            arcs.len(),
            weights.len()
        );

        Ok(ImmutableFst {
            start,
            properties,
            states,
            arcs,
            weights,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::read(&mut bytes)
    }

    pub(crate) fn arc_entries(&self, state: StateId) -> &[ArcEntry] {
        match self.states.get(state as usize) {
            Some(entry) => &self.arcs[entry.arc_offset..entry.arc_offset + entry.arc_count],
            None => &[],
        }
    }

    pub(crate) fn span(&self, span: Span) -> &[u8] {
        &self.weights[span.offset..span.offset + span.len]
    }

    pub(crate) fn to_arc(&self, arc: &ArcEntry) -> FstArc<'_> {
        FstArc {
            label: arc.label,
            next: arc.next,
            weight: self.span(arc.weight),
        }
    }
}
