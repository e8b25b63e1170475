//! Derivation metrics.
//!
//! Counters collected by a [`Derivation`](super::Derivation) as it runs. They
//! cost a handful of integer adds per step and are always on; callers read them
//! through [`Derivation::metrics`](super::Derivation::metrics) or the
//! [`derive_with`](crate::derive_with) helpers.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeriveMetrics {
    /// States popped from the stack.
    pub steps: usize,
    /// Rule/position pairs returned by the rule tree.
    pub selected: usize,
    /// Of those, pairs that matched and had not run yet.
    pub matched: usize,
    /// Candidates dropped because an apavada matched at the same operand.
    pub dominated: usize,
    /// Ordinary applications that changed the state.
    pub applied: usize,
    /// Optional rules that branched (each counts once).
    pub optional: usize,
    /// Blocking rules that fired.
    pub blocked: usize,
    /// Candidates skipped because the operator left the state unchanged.
    pub unchanged: usize,
    /// Candidates skipped because the operator failed.
    pub operator_failures: usize,
    /// Successor states dropped as duplicates of visited states.
    pub collapsed: usize,
    /// Successor states dropped because the frontier cap was reached.
    pub pruned: usize,
    /// States where no rule applied.
    pub terminal: usize,
    /// Distinct forms emitted.
    pub forms: usize,
    /// Whether a budget from [`Options`](crate::Options) stopped the search early.
    pub truncated: bool,
    /// Wall time spent inside the derivation so far.
    pub elapsed: Duration,
}
