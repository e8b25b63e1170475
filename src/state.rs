//! Derivation states.
//!
//! A [`State`] is an ordered sequence of [`Term`]s plus the append-only list of
//! `(rule, position)` applications that produced it. Equality and hashing look
//! only at the terms, so two branches that converge on the same sequence collapse
//! into one regardless of how they got there.
//!
//! Every edit returns a new state. Terms are `Arc` handles, so copying the term
//! vector is cheap, and the history is a persistent linked list shared between a
//! state and all of its successors.

use crate::term::Term;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

struct Entry {
    rule: Arc<str>,
    index: usize,
    prev: Option<Arc<Entry>>,
}

/// Append-only `(rule, position)` application log.
#[derive(Clone, Default)]
pub struct History {
    head: Option<Arc<Entry>>,
    len: usize,
}

impl History {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&self, rule: &Arc<str>, index: usize) -> History {
        let entry = Entry { rule: Arc::clone(rule), index, prev: self.head.clone() };
        History { head: Some(Arc::new(entry)), len: self.len + 1 }
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> Vec<(Arc<str>, usize)> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.head.as_deref();
        while let Some(entry) = cur {
            out.push((Arc::clone(&entry.rule), entry.index));
            cur = entry.prev.as_deref();
        }
        out.reverse();
        out
    }

    pub fn contains(&self, rule: &str, index: usize) -> bool {
        let mut cur = self.head.as_deref();
        while let Some(entry) = cur {
            if entry.index == index && &*entry.rule == rule {
                return true;
            }
            cur = entry.prev.as_deref();
        }
        false
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries().iter().map(|(rule, index)| format!("{rule}@{index}"))).finish()
    }
}

/// One step of a derivation.
#[derive(Clone, Default)]
pub struct State {
    terms: Vec<Term>,
    history: History,
}

impl State {
    pub fn new(terms: Vec<Term>) -> Self {
        State { terms, history: History::default() }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The term at `index`, or `None` past either end (the "null term").
    pub fn get(&self, index: usize) -> Option<&Term> {
        self.terms.get(index)
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Replace the term at `index`. Out-of-range indices leave the terms as they are.
    pub fn swap(&self, index: usize, term: Term) -> State {
        let mut c = self.clone();
        if let Some(slot) = c.terms.get_mut(index) {
            *slot = term;
        }
        c
    }

    /// Insert `term` before `index` (`index == len` appends).
    pub fn insert(&self, index: usize, term: Term) -> State {
        let mut c = self.clone();
        let at = index.min(c.terms.len());
        c.terms.insert(at, term);
        c
    }

    pub fn remove(&self, index: usize) -> State {
        let mut c = self.clone();
        if index < c.terms.len() {
            c.terms.remove(index);
        }
        c
    }

    /// Record that `rule` was applied (or declined) with its window starting at `index`.
    ///
    /// The rule name is also added to the op-set of the term at `index`, which is
    /// what keeps the rule from being selected there again.
    pub fn mark_rule(&self, rule: &Arc<str>, index: usize) -> State {
        let mut c = self.clone();
        c.history = c.history.push(rule, index);
        if let Some(slot) = c.terms.get_mut(index) {
            *slot = slot.add_ops([rule]);
        }
        c
    }

    /// Append `(rule, index)` to the history only. Used when the anchor term is gone.
    pub fn record(&self, rule: &Arc<str>, index: usize) -> State {
        let mut c = self.clone();
        c.history = c.history.push(rule, index);
        c
    }

    /// Add `rules` to the op-set of the term at `index` without touching history.
    pub fn block(&self, index: usize, rules: &[Arc<str>]) -> State {
        if rules.is_empty() {
            return self.clone();
        }
        let mut c = self.clone();
        if let Some(slot) = c.terms.get_mut(index) {
            *slot = slot.add_ops(rules);
        }
        c
    }

    /// Concatenated surface text of every term.
    pub fn render(&self) -> String {
        self.terms.iter().map(Term::text).collect()
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.terms.hash(state);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State").field("terms", &self.terms).field("history", &self.history).finish()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.terms.iter().map(Term::text).collect();
        write!(f, "[{}]", parts.join(" + "))
    }
}

impl<'a> IntoIterator for &'a State {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}
