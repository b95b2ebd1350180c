//! Ordered enumeration of FST entries.

use std::ops::Bound;

use crate::lexical::fst::StateId;
use crate::lexical::fst::immutable::ImmutableFst;

#[derive(Debug, Clone, Copy)]
struct Frame {
    state: StateId,
    /// Next arc to follow.
    arc: usize,
    key_len: usize,
    output_len: usize,
    entered: bool,
}

/// Depth-first walk yielding `(key, payload)` pairs in key order.
///
/// Subtrees that lie entirely outside the bounds are never visited.
#[derive(Debug)]
pub struct FstStream<'a> {
    fst: &'a ImmutableFst,
    stack: Vec<Frame>,
    key: Vec<u8>,
    output: Vec<u8>,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
}

impl<'a> FstStream<'a> {
    pub(crate) fn new(
        fst: &'a ImmutableFst,
        state: StateId,
        key: Vec<u8>,
        output: Vec<u8>,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Self {
        let stack = vec![Frame {
            state,
            arc: 0,
            key_len: key.len(),
            output_len: output.len(),
            entered: false,
        }];
        FstStream {
            fst,
            stack,
            key,
            output,
            lower,
            upper,
        }
    }

    pub(crate) fn empty(fst: &'a ImmutableFst) -> Self {
        FstStream {
            fst,
            stack: Vec::new(),
            key: Vec::new(),
            output: Vec::new(),
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// No extension of `prefix` can reach the lower bound.
    fn below_lower(&self, prefix: &[u8]) -> bool {
        match &self.lower {
            Bound::Included(lower) | Bound::Excluded(lower) => {
                prefix < lower.as_slice() && !lower.starts_with(prefix)
            }
            Bound::Unbounded => false,
        }
    }

    /// Neither `prefix` nor any extension of it lies below the upper bound.
    fn above_upper(&self, prefix: &[u8]) -> bool {
        match &self.upper {
            Bound::Included(upper) => prefix > upper.as_slice(),
            Bound::Excluded(upper) => prefix >= upper.as_slice(),
            Bound::Unbounded => false,
        }
    }

    fn in_bounds(&self, key: &[u8]) -> bool {
        let lower_ok = match &self.lower {
            Bound::Included(lower) => key >= lower.as_slice(),
            Bound::Excluded(lower) => key > lower.as_slice(),
            Bound::Unbounded => true,
        };
        lower_ok && !self.above_upper(key)
    }
}

impl Iterator for FstStream<'_> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let fst = self.fst;
        while let Some(frame) = self.stack.last().copied() {
            self.key.truncate(frame.key_len);
            self.output.truncate(frame.output_len);

            if !frame.entered {
                if let Some(top) = self.stack.last_mut() {
                    top.entered = true;
                }
                if let Some(weight) = fst.final_weight(frame.state) {
                    if self.in_bounds(&self.key) {
                        let mut output = self.output.clone();
                        output.extend_from_slice(weight);
                        return Some((self.key.clone(), output));
                    }
                }
                continue;
            }

            let Some(arc) = fst.arc(frame.state, frame.arc) else {
                self.stack.pop();
                continue;
            };

            self.key.push(arc.label);
            if self.above_upper(&self.key) {
                // Later arcs have larger labels.
                self.stack.pop();
                continue;
            }
            if let Some(top) = self.stack.last_mut() {
                top.arc += 1;
            }
            if self.below_lower(&self.key) {
                continue;
            }

            self.output.extend_from_slice(arc.weight);
            self.stack.push(Frame {
                state: arc.next,
                arc: 0,
                key_len: self.key.len(),
                output_len: self.output.len(),
                entered: false,
            });
        }
        None
    }
}
