//! Label lookup over the sorted arcs of one state.

use crate::lexical::fst::StateId;
use crate::lexical::fst::immutable::{FstArc, ImmutableFst};

/// Finds the arc carrying a given label by binary search.
///
/// ```
/// use pilum::lexical::fst::{FstBuilder, SortedArcMatcher};
///
/// let mut builder = FstBuilder::new();
/// builder.insert(b"ab", b"x");
/// builder.insert(b"ac", b"y");
/// let (fst, _) = builder.finish();
///
/// let mut matcher = SortedArcMatcher::new(&fst);
/// matcher.set_state(fst.start());
/// assert!(matcher.find(b'a'));
/// let next = matcher.value().unwrap().next;
/// matcher.set_state(next);
/// assert!(matcher.find(b'c'));
/// assert!(!matcher.find(b'z'));
/// ```
#[derive(Debug, Clone)]
pub struct SortedArcMatcher<'a> {
    fst: &'a ImmutableFst,
    state: StateId,
    found: Option<usize>,
}

impl<'a> SortedArcMatcher<'a> {
    pub fn new(fst: &'a ImmutableFst) -> Self {
        SortedArcMatcher {
            fst,
            state: fst.start(),
            found: None,
        }
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn set_state(&mut self, state: StateId) {
        self.state = state;
        self.found = None;
    }

    /// Look for an arc labelled `label` leaving the current state.
    pub fn find(&mut self, label: u8) -> bool {
        self.found = self
            .fst
            .arc_entries(self.state)
            .binary_search_by_key(&label, |arc| arc.label)
            .ok();
        self.found.is_some()
    }

    /// The arc matched by the last successful [`SortedArcMatcher::find`].
    pub fn value(&self) -> Option<FstArc<'a>> {
        let fst = self.fst;
        self.found.and_then(|idx| fst.arc(self.state, idx))
    }

    /// Final weight of the current state.
    pub fn final_weight(&self) -> Option<&'a [u8]> {
        self.fst.final_weight(self.state)
    }
}
