//! Rules: a window of filters plus an operator.
//!
//! ## Window layout
//!
//! A rule's window is stored flattened as `left ++ center ++ right`. The rule
//! matches with its window starting at position `i` when `filters[k]` holds at
//! `i + k` for every `k`. The operand sits at `i + offset`, where `offset` is the
//! length of the left context:
//!
//! ```text
//!   i        i+offset
//!   │           │
//!   [ left ... ][ center ][ right ... ]
//! ```
//!
//! Insertion rules have no center: the new term is placed at `i + offset`,
//! between the left and right contexts.
//!
//! ## Anchors and idempotence
//!
//! A rule records itself in the op-set of its *anchor* term: the operand if one
//! exists, otherwise the first term of the window. The search never selects a
//! rule whose anchor already lists it. Because the anchor is tied to the operand,
//! a rule can block other rules (its utsarga) on the very term they would act on,
//! whatever their window shapes.

use crate::error::{BuildError, OperatorError};
use crate::filter::Filter;
use crate::operator::Operator;
use crate::rank::{Rank, RuleRank};
use crate::state::State;
use crate::term::Locus;
use smallvec::{SmallVec, smallvec};
use std::fmt;
use std::sync::Arc;

/// Grammatical category of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleCategory {
    /// Ordinary operational rule.
    #[default]
    Vidhi,
    /// Designation (tag-assigning) rule.
    Samjna,
    /// Extension rule: treats one thing as another.
    Atidesha,
    /// Metarule.
    Paribhasha,
}

/// How a rule takes part in conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleKind {
    #[default]
    Ordinary,
    /// "na" rule: performs no edit but blocks every rule of its operator's category.
    Blocking,
    /// "elsewhere" rule: every earlier conflicting rule overrides it.
    Residual,
}

/// One result of applying a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The rule was optional and the branch declines it.
    Declined(State),
    /// The operator ran and changed the state (or the rule is optional).
    Accepted(State),
    /// A blocking rule fired.
    Blocked(State),
}

impl Outcome {
    pub fn state(&self) -> &State {
        match self {
            Outcome::Declined(s) | Outcome::Accepted(s) | Outcome::Blocked(s) => s,
        }
    }

    pub fn into_state(self) -> State {
        match self {
            Outcome::Declined(s) | Outcome::Accepted(s) | Outcome::Blocked(s) => s,
        }
    }
}

pub type Outcomes = SmallVec<[Outcome; 2]>;

/// An immutable rewrite rule.
#[derive(Clone)]
pub struct Rule {
    name: Arc<str>,
    filters: Vec<Filter>,
    offset: usize,
    operator: Operator,
    locus: Locus,
    category: RuleCategory,
    kind: RuleKind,
    optional: bool,
    priority: u16,
    rank: RuleRank,
    pub(crate) utsarga: Vec<Arc<str>>,
    pub(crate) apavada: Vec<Arc<str>>,
}

impl Rule {
    /// Build a rule from its three context slots.
    ///
    /// `center` may be `None` only for insertion operators, and insertion
    /// operators must not have one.
    pub fn new(
        name: &str,
        left: Vec<Filter>,
        center: Option<Filter>,
        right: Vec<Filter>,
        operator: Operator,
    ) -> Result<Rule, BuildError> {
        if operator.is_insert() && center.is_some() {
            return Err(BuildError::InsertWithCenter(name.to_string()));
        }
        let offset = left.len();
        let filters: Vec<Filter> = left.into_iter().chain(center).chain(right).collect();
        if filters.is_empty() {
            return Err(BuildError::EmptyWindow(name.to_string()));
        }
        let category = match operator.kind() {
            crate::operator::OpKind::AddTags(_) => RuleCategory::Samjna,
            _ => RuleCategory::Vidhi,
        };
        let mut rule = Rule {
            name: Arc::from(name),
            filters,
            offset,
            operator,
            locus: Locus::default(),
            category,
            kind: RuleKind::Ordinary,
            optional: false,
            priority: 0,
            rank: RuleRank::default(),
            utsarga: Vec::new(),
            apavada: Vec::new(),
        };
        rule.rerank();
        Ok(rule)
    }

    fn rerank(&mut self) {
        let filters = Rank::and(self.filters.iter().map(Filter::rank));
        self.rank = RuleRank::new(self.priority, self.category, self.locus, filters);
    }

    pub fn with_locus(mut self, locus: Locus) -> Self {
        self.locus = locus;
        self.rerank();
        self
    }

    pub fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self.rerank();
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self.rerank();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.kind = RuleKind::Blocking;
        self
    }

    pub fn residual(mut self) -> Self {
        self.kind = RuleKind::Residual;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BuildError> {
        if self.optional && self.kind == RuleKind::Blocking {
            return Err(BuildError::ConflictingModifiers(self.name.to_string()));
        }
        Ok(())
    }

    // --- Accessors --------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn locus(&self) -> Locus {
        self.locus
    }

    pub fn category(&self) -> RuleCategory {
        self.category
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn rank(&self) -> RuleRank {
        self.rank
    }

    /// Rules this rule overrides.
    pub fn utsarga(&self) -> &[Arc<str>] {
        &self.utsarga
    }

    /// Rules that override this rule.
    pub fn apavada(&self) -> &[Arc<str>] {
        &self.apavada
    }

    /// Every `(feature, slot)` pair of the window, with nested ANDs flattened.
    pub fn features(&self) -> Vec<(Filter, usize)> {
        self.filters.iter().enumerate().flat_map(|(k, f)| f.supersets().iter().map(move |s| (s.clone(), k))).collect()
    }

    /// Index of the term this rule records itself on, for a window starting at `start`.
    pub fn anchor(&self, start: usize, len: usize) -> usize {
        let operand = start + self.offset;
        if operand < len { operand } else { start }
    }

    /// Whether the rule already ran (or was declined/blocked) for the window at `start`.
    pub fn has_run(&self, state: &State, start: usize) -> bool {
        state.get(self.anchor(start, state.len())).is_some_and(|t| t.has_applied(&self.name))
    }

    // --- Matching ---------------------------------------------------------------

    /// Whether every window filter holds with the window starting at `start`.
    pub fn matches(&self, state: &State, start: usize) -> bool {
        self.filters.iter().enumerate().all(|(k, f)| f.allows(state, start + k))
    }

    fn mark(&self, before: &State, after: State, start: usize, block: bool) -> State {
        if after.len() < before.len() {
            return after.record(&self.name, start + self.offset);
        }
        let anchor = self.anchor(start, after.len());
        let marked = after.mark_rule(&self.name, anchor);
        if block { marked.block(anchor, &self.utsarga) } else { marked }
    }

    /// Apply with the window starting at `start`.
    ///
    /// - Blocking rules yield one [`Outcome::Blocked`] state that records the rule
    ///   and blocks its utsarga on the anchor.
    /// - Optional rules yield [`Outcome::Declined`] then [`Outcome::Accepted`].
    /// - Ordinary rules yield [`Outcome::Accepted`] only if the operator changed
    ///   the terms; otherwise nothing.
    pub fn apply(&self, state: &State, start: usize) -> Result<Outcomes, OperatorError> {
        let operand = start + self.offset;
        if self.kind == RuleKind::Blocking {
            return Ok(smallvec![Outcome::Blocked(self.mark(state, state.clone(), start, true))]);
        }
        let applied = self.operator.apply(state, operand, self.locus)?;
        let mut out = Outcomes::new();
        if self.optional {
            let declined = self.operator.decline(state, operand);
            out.push(Outcome::Declined(self.mark(state, declined, start, false)));
        }
        if self.optional || applied != *state {
            out.push(Outcome::Accepted(self.mark(state, applied, start, true)));
        }
        Ok(out)
    }

    // --- Conflict ---------------------------------------------------------------

    /// Whether `other` overrides `self`.
    ///
    /// True when the two rules are distinct, write the same locus, carry
    /// conflicting operators, and `other`'s window is at least as specific: for
    /// every filter of `self` there is a filter of `other` at the same position
    /// relative to the operand that is a subset of it. `other` may constrain
    /// extra positions.
    pub fn has_apavada(&self, other: &Rule) -> bool {
        if self.name == other.name || self.locus != other.locus || !self.operator.conflicts_with(&other.operator) {
            return false;
        }
        self.filters.iter().enumerate().all(|(k, general)| {
            let Some(j) = (k + other.offset).checked_sub(self.offset) else {
                return false;
            };
            other.filters.get(j).is_some_and(|specific| specific.subset_of(general))
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<rule({})>", self.name)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rule {}", self.name)?;
        let left = &self.filters[..self.offset];
        let rest = &self.filters[self.offset..];
        let (center, right) =
            if self.operator.is_insert() { (&[][..], rest) } else { rest.split_at(rest.len().min(1)) };
        writeln!(f, "    left    : {left:?}")?;
        writeln!(f, "    center  : {center:?}")?;
        writeln!(f, "    right   : {right:?}")?;
        writeln!(f, "    operator: {:?}", self.operator)?;
        writeln!(f, "    kind    : {:?}{}", self.kind, if self.optional { " (optional)" } else { "" })?;
        writeln!(f, "    category: {:?}", self.category)?;
        writeln!(f, "    locus   : {:?}", self.locus)?;
        writeln!(f, "    rank    : {:?}", self.rank)?;
        writeln!(f, "    utsarga : {:?}", self.utsarga)?;
        write!(f, "    apavada : {:?}", self.apavada)
    }
}
