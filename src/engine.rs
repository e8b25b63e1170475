//! Derivation engine.
//!
//! This module is the *public entry point* for building a rule table and
//! running derivations over it. It is split into focused submodules under
//! `src/engine/`; the public paths (`crate::Engine`, `crate::Derivation`, ...)
//! are re-exported here.
//!
//! ## How the parts work together
//!
//! ```text
//! sections (stubs) ──┐
//!                    │  expand                 (expand.rs)
//!                    v
//!               Vec<Rule> ── sort by NameKey + infer utsarga/apavada
//!                    │                         (inference.rs)
//!                    v
//!               RuleTree::new                  (tree.rs)
//!                    │
//!                    v
//!                 Engine  ── derive(terms) ──> Derivation   (search.rs)
//!                                               - select via RuleTree
//!                                               - idempotence + dominance
//!                                               - apply, branch, dedup (dedup.rs)
//!                                               - count (metrics.rs)
//!                                                    │
//!                                                    v
//!                                         lazy terminal forms (String)
//! ```
//!
//! Building is the expensive, fallible part: every configuration error
//! surfaces as a [`BuildError`](crate::BuildError) from [`Engine::build`] or
//! [`Engine::from_rules`]. Deriving never fails; an empty sequence of forms is
//! a valid result.
//!
//! ## Responsibilities by module
//!
//! - `expand.rs`: resolves stubs against inherited contexts and the previous
//!   rule, then reduces windows.
//! - `inference.rs`: declaration order (`NameKey`) and the dominance graph.
//! - `tree.rs`: the feature-partitioned rule index (`RuleTree`).
//! - `search.rs`: `Engine` and the depth-first `Derivation`.
//! - `dedup.rs`: visited-state and emitted-form bookkeeping.
//! - `metrics.rs`: per-derivation counters.
//!
//! ## Debugging
//!
//! The engine logs through `tracing`: `debug` for build and run summaries,
//! `trace` for every step, `warn` for operator failures and exhausted budgets.

#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/expand.rs"]
mod expand;
#[path = "engine/inference.rs"]
mod inference;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/search.rs"]
mod search;
#[path = "engine/tree.rs"]
mod tree;

#[allow(unused_imports)]
pub use inference::NameKey;
#[allow(unused_imports)]
pub use metrics::DeriveMetrics;
#[allow(unused_imports)]
pub use search::{Derivation, Engine};
#[allow(unused_imports)]
pub use tree::{RuleTree, TreeDisplay};
