//! Rule-driven derivation of surface word-forms.
//!
//! A derivation starts from a short sequence of [`Term`]s and repeatedly applies
//! [`Rule`]s (a window of [`Filter`]s plus an [`Operator`]) until none applies.
//! General rules (utsarga) give way to more specific conflicting rules
//! (apavada); the dominance relation is inferred once when the [`Engine`] is
//! built, not declared by hand.
//!
//! Rule tables are usually written as [`Section`]s of terse [`RuleStub`]s (see
//! [`stub!`]) and built with [`Engine::build`]. Derivation is lazy:
//! [`Engine::derive`] returns an iterator of distinct terminal forms.

extern crate self as prakriya;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod filter;
mod operator;
mod rank;
mod rule;
mod state;
mod stub;
mod term;

pub use api::{DeriveResult, DeriveResultVerbose, Form, Options, Step, derive, derive_verbose_with, derive_with};
pub use engine::{Derivation, DeriveMetrics, Engine, NameKey, RuleTree, TreeDisplay};
pub use error::{BuildError, OperatorError, Result};
pub use filter::{Domain, Filter, FilterCategory, StatePredicate, TermPredicate};
pub use operator::{Category, OpKind, Operator, StateFn, SubstituteFn, Target};
pub use rank::{Rank, RuleRank};
pub use rule::{Outcome, Outcomes, Rule, RuleCategory, RuleKind};
pub use state::{History, State};
pub use stub::{Cond, Inherit, OpRef, RuleStub, Section, StubFlags};
pub use term::{Locus, Space, Term};
