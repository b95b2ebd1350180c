//! Construction of minimal FSTs from sorted input.
//!
//! The builder keeps the path of the last inserted key as a stack of
//! unfinished states. Inserting a key freezes every state below the prefix
//! it shares with the previous key, since no later key can reach them, and
//! hands each frozen state to a registry that merges it with an identical
//! state compiled earlier. Outputs are pushed towards the start state: an
//! arc carries the common prefix of every payload reachable through it.

use ahash::AHashMap;
use log::debug;

use crate::lexical::fst::immutable::{ArcEntry, ImmutableFst, Span, StateEntry};
use crate::lexical::fst::weight::{Semiring, StringLeftWeight};
use crate::lexical::fst::{StateId, properties};

/// Size of a finished FST.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FstStats {
    pub num_states: usize,
    pub num_arcs: usize,
    /// Bytes of all final and arc weights.
    pub total_weight_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CompiledArc {
    label: u8,
    output: StringLeftWeight,
    next: StateId,
}

/// A state whose arcs all point at compiled states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BuilderNode {
    final_weight: StringLeftWeight,
    arcs: Vec<CompiledArc>,
}

impl Default for BuilderNode {
    fn default() -> Self {
        BuilderNode {
            final_weight: StringLeftWeight::zero(),
            arcs: Vec::new(),
        }
    }
}

/// The arc of an unfinished state that lies on the last key's path.
#[derive(Debug)]
struct LastArc {
    label: u8,
    output: StringLeftWeight,
}

#[derive(Debug, Default)]
struct UnfinishedNode {
    node: BuilderNode,
    last: Option<LastArc>,
}

impl UnfinishedNode {
    fn final_node(weight: StringLeftWeight) -> Self {
        UnfinishedNode {
            node: BuilderNode {
                final_weight: weight,
                arcs: Vec::new(),
            },
            last: None,
        }
    }

    /// Turn the pending arc into a compiled one pointing at `next`.
    fn freeze_last(&mut self, next: StateId) {
        if let Some(last) = self.last.take() {
            self.node.arcs.push(CompiledArc {
                label: last.label,
                output: last.output,
                next,
            });
        }
    }

    /// Prepend `prefix` to every output leaving this state.
    fn add_output_prefix(&mut self, prefix: &StringLeftWeight) {
        if !self.node.final_weight.is_zero() {
            self.node.final_weight = prefix.times(&self.node.final_weight);
        }
        for arc in &mut self.node.arcs {
            arc.output = prefix.times(&arc.output);
        }
        if let Some(last) = &mut self.last {
            last.output = prefix.times(&last.output);
        }
    }
}

/// Builds an [`ImmutableFst`] from keys inserted in strictly increasing
/// byte order.
///
/// Keys out of order or repeated produce an unspecified FST; the builder
/// does not check.
#[derive(Debug)]
pub struct FstBuilder {
    unfinished: Vec<UnfinishedNode>,
    registry: AHashMap<BuilderNode, StateId>,
    states: Vec<StateEntry>,
    arcs: Vec<ArcEntry>,
    weights: Vec<u8>,
    len: usize,
}

impl Default for FstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FstBuilder {
    pub fn new() -> Self {
        FstBuilder {
            unfinished: vec![UnfinishedNode::default()],
            registry: AHashMap::new(),
            states: Vec::new(),
            arcs: Vec::new(),
            weights: Vec::new(),
            len: 0,
        }
    }

    /// Keys inserted so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, key: &[u8], payload: &[u8]) {
        let output = StringLeftWeight::from(payload);
        self.len += 1;

        if key.is_empty() {
            // Only valid as the first key; the start state accepts.
            if let Some(root) = self.unfinished.first_mut() {
                root.node.final_weight = output;
            }
            return;
        }

        let (prefix_len, output) = self.common_prefix_and_set_output(key, output);
        self.compile_from(prefix_len);
        self.add_suffix(&key[prefix_len..], output);
    }

    /// Freeze every remaining state and produce the FST.
    pub fn finish(mut self) -> (ImmutableFst, FstStats) {
        self.compile_from(0);
        let root = self.unfinished.pop().map(|u| u.node).unwrap_or_default();
        let start = self.compile(root);

        let stats = FstStats {
            num_states: self.states.len(),
            num_arcs: self.arcs.len(),
            total_weight_size: self.weights.len(),
        };
        debug!(
            "Built FST from {} keys: {} states, {} arcs, {} weight bytes",
            self.len, stats.num_states, stats.num_arcs, stats.total_weight_size
        );

        let fst = ImmutableFst {
            start,
            properties: properties::BUILT,
            states: self.states,
            arcs: self.arcs,
            weights: self.weights,
        };
        (fst, stats)
    }

    /// Walk the last key's path along `key`, splitting outputs so that each
    /// shared arc keeps only what both keys agree on. Returns the length of
    /// the shared prefix and what remains of `output` past it.
    fn common_prefix_and_set_output(
        &mut self,
        key: &[u8],
        mut output: StringLeftWeight,
    ) -> (usize, StringLeftWeight) {
        let mut i = 0;
        while i < key.len() && i < self.unfinished.len() {
            let pushed_down = {
                let Some(last) = self.unfinished[i].last.as_mut() else {
                    break;
                };
                if last.label != key[i] {
                    break;
                }
                let common = last.output.plus(&output);
                let pushed_down = last.output.divide_left(&common);
                output = output.divide_left(&common);
                last.output = common;
                pushed_down
            };
            i += 1;
            if !pushed_down.is_one() {
                self.unfinished[i].add_output_prefix(&pushed_down);
            }
        }
        (i, output)
    }

    /// Compile every unfinished state deeper than `depth`.
    fn compile_from(&mut self, depth: usize) {
        let mut next: Option<StateId> = None;
        while depth + 1 < self.unfinished.len() {
            let Some(mut unfinished) = self.unfinished.pop() else {
                break;
            };
            if let Some(next) = next {
                unfinished.freeze_last(next);
            }
            next = Some(self.compile(unfinished.node));
        }
        if let (Some(next), Some(top)) = (next, self.unfinished.last_mut()) {
            top.freeze_last(next);
        }
    }

    fn add_suffix(&mut self, suffix: &[u8], output: StringLeftWeight) {
        let Some((&first, rest)) = suffix.split_first() else {
            return;
        };
        if let Some(top) = self.unfinished.last_mut() {
            top.last = Some(LastArc {
                label: first,
                output,
            });
        }
        for &label in rest {
            self.unfinished.push(UnfinishedNode {
                node: BuilderNode::default(),
                last: Some(LastArc {
                    label,
                    output: StringLeftWeight::one(),
                }),
            });
        }
        self.unfinished
            .push(UnfinishedNode::final_node(StringLeftWeight::one()));
    }

    /// Append `node` to the flat arrays unless an equivalent state exists.
    fn compile(&mut self, node: BuilderNode) -> StateId {
        if let Some(&id) = self.registry.get(&node) {
            return id;
        }

        let id = self.states.len() as StateId;
        let final_weight = node
            .final_weight
            .as_bytes()
            .map(|bytes| push_weight(&mut self.weights, bytes));

        let arc_offset = self.arcs.len();
        for arc in &node.arcs {
            let weight = push_weight(&mut self.weights, arc.output.as_bytes().unwrap_or_default());
            self.arcs.push(ArcEntry {
                label: arc.label,
                next: arc.next,
                weight,
            });
        }

        self.states.push(StateEntry {
            arc_offset,
            arc_count: node.arcs.len(),
            final_weight,
        });
        self.registry.insert(node, id);
        id
    }
}

fn push_weight(weights: &mut Vec<u8>, bytes: &[u8]) -> Span {
    let span = Span {
        offset: weights.len(),
        len: bytes.len(),
    };
    weights.extend_from_slice(bytes);
    span
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(entries: &[(&[u8], &[u8])]) -> (ImmutableFst, FstStats) {
        let mut builder = FstBuilder::new();
        for (key, payload) in entries {
            builder.insert(key, payload);
        }
        assert_eq!(builder.len(), entries.len());
        builder.finish()
    }

    #[test]
    fn test_empty() {
        let builder = FstBuilder::new();
        assert!(builder.is_empty());
        let (fst, stats) = builder.finish();
        assert_eq!(stats.num_states, 1);
        assert_eq!(stats.num_arcs, 0);
        assert_eq!(fst.get(b""), None);
        assert_eq!(fst.stream().count(), 0);
    }

    #[test]
    fn test_empty_key() {
        let (fst, _) = build(&[(b"", b"root"), (b"a", b"x")]);
        assert_eq!(fst.get(b""), Some(b"root".to_vec()));
        assert_eq!(fst.get(b"a"), Some(b"x".to_vec()));
    }

    #[test]
    fn test_shared_suffixes_are_merged() {
        // "mop", "pop" and "top" differ only in their first arc.
        let (fst, stats) = build(&[(b"mop", b""), (b"pop", b""), (b"top", b"")]);
        assert_eq!(stats.num_states, 4);
        assert_eq!(stats.num_arcs, 5);
        assert_eq!(fst.num_arcs_of(fst.start()), 3);
    }

    #[test]
    fn test_distinct_payloads_block_merging() {
        let (_, merged) = build(&[(b"ax", b"1"), (b"bx", b"1")]);
        let (_, split) = build(&[(b"ax", b"1"), (b"bx", b"2")]);
        assert_eq!(merged.num_states, 3);
        assert_eq!(split.num_states, 3);
        // The differing payloads sit on the first arcs, so the tails still merge.
        assert_eq!(split.total_weight_size, 2);
    }

    #[test]
    fn test_prefix_keys() {
        let entries: &[(&[u8], &[u8])] = &[
            (b"a", b"1"),
            (b"ab", b"12"),
            (b"abc", b"123"),
            (b"abd", b"124"),
            (b"b", b"9"),
        ];
        let (fst, _) = build(entries);
        for (key, payload) in entries {
            assert_eq!(fst.get(key), Some(payload.to_vec()), "key {key:?}");
        }
        assert_eq!(fst.get(b"abe"), None);
    }

    #[test]
    fn test_stats_match_fst() {
        let (fst, stats) = build(&[(b"car", b"c"), (b"cat", b"cc"), (b"dog", b"d")]);
        assert_eq!(stats.num_states, fst.num_states());
        assert_eq!(stats.num_arcs, fst.num_arcs());
        assert_eq!(stats.total_weight_size, fst.total_weight_size());
    }
}
