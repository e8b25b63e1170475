//! Error types.
//!
//! Two families, matching the two lifetimes of the engine:
//!
//! - [`BuildError`]: the rule table is static configuration, so anything wrong
//!   with it is detected while the [`Engine`](crate::Engine) is built and aborts
//!   construction.
//! - [`OperatorError`]: an Operator refusing a term at derivation time. This never
//!   crosses the `derive` boundary; the search logs it and treats the rule as
//!   non-matching at that position.

use thiserror::Error;

/// Fatal configuration errors found while expanding stubs or building the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("rule '{0}' is declared more than once")]
    DuplicateRule(String),

    #[error("rule '{0}' has an empty window (no filter constrains any term)")]
    EmptyWindow(String),

    #[error("rule '{rule}' repeats the previous {what}, but there is no previous rule to repeat")]
    NothingToRepeat { rule: String, what: &'static str },

    #[error("rule '{rule}' repeats {slot} filter #{index} of the previous rule, which has no such filter")]
    MissingPreviousFilter { rule: String, slot: &'static str, index: usize },

    #[error("rule '{0}' is marked both blocking and optional")]
    ConflictingModifiers(String),

    #[error("operator '{operator}' of kind {kind} cannot carry conflict category {category}")]
    CategoryMismatch { operator: String, kind: &'static str, category: String },

    #[error("rule '{0}' has an insertion operator but also constrains its center slot")]
    InsertWithCenter(String),
}

/// A recoverable failure of an Operator on a concrete term.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("operator '{operator}' has no term at position {index}")]
    OutOfRange { operator: String, index: usize },

    #[error("operator '{operator}' cannot apply to '{term}': {reason}")]
    InvalidTerm { operator: String, term: String, reason: String },
}

impl OperatorError {
    /// Convenience constructor for operator bodies that reject a term.
    pub fn invalid(operator: &str, term: &str, reason: impl Into<String>) -> Self {
        OperatorError::InvalidTerm { operator: operator.to_string(), term: term.to_string(), reason: reason.into() }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
