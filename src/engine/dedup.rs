//! Deduplication keys for the search.
//!
//! Two branches that reach the same term sequence explore the same future, so
//! the search keeps one key per visited state and drops later arrivals. The key
//! is the term vector alone: history is ignored (as in `State` equality) and not
//! kept alive by the visited set.
//!
//! Terms carry their op-sets, so a state where a rule has been declined and one
//! where it has not are *different* keys even if their text is identical.

use crate::state::State;
use crate::term::Term;
use std::collections::HashSet;

/// Visited-set key for a [`State`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateKey(Vec<Term>);

impl StateKey {
    pub(crate) fn of(state: &State) -> Self {
        StateKey(state.terms().to_vec())
    }
}

/// Visited states plus already-emitted surface forms.
#[derive(Debug, Default)]
pub(crate) struct Seen {
    states: HashSet<StateKey>,
    forms: HashSet<String>,
}

impl Seen {
    /// Record `state`; false if an equal state was seen before.
    pub(crate) fn visit(&mut self, state: &State) -> bool {
        self.states.insert(StateKey::of(state))
    }

    /// Record a terminal form; false if it was already emitted.
    pub(crate) fn emit(&mut self, form: &str) -> bool {
        if self.forms.contains(form) {
            return false;
        }
        self.forms.insert(form.to_string())
    }

    pub(crate) fn states(&self) -> usize {
        self.states.len()
    }
}
