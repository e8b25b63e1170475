//! Declarative rule stubs.
//!
//! Rules are written tersely, in sections that share an inherited context:
//!
//! ```text
//! Section { inherit: Inherit { center: tag(anga), right: tag(sarvadhatuka) },
//!   stubs: [
//!     "7.3.84"  center: Base           op: set_last(guna)
//!     "7.3.86"  center: Extend(last u) op: Same              // ANDed with tag(anga)
//!     "7.3.87"  center: Same           op: ...  OPTIONAL      // repeats 7.3.86's center
//!   ] }
//! ```
//!
//! Stubs are expanded into [`Rule`](crate::Rule)s when the engine is built;
//! see `engine/expand.rs` for the exact resolution rules.

use crate::filter::Filter;
use crate::operator::Operator;
use crate::rule::RuleCategory;
use crate::term::Locus;
use bitflags::bitflags;

bitflags! {
    /// Stub modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StubFlags: u8 {
        /// The rule may be declined.
        const OPTIONAL = 1 << 0;
        /// The rule only blocks rules of its operator's category.
        const BLOCKING = 1 << 1;
        /// The rule covers whatever earlier conflicting rules leave over.
        const RESIDUAL = 1 << 2;
    }
}

/// One context entry of a stub slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    /// Use the inherited base filter.
    Base,
    /// Repeat the previous rule's filter at this position.
    Same,
    /// Narrow the base filter (ANDed with it unless the base is `allow_all`).
    Extend(Filter),
}

impl From<Filter> for Cond {
    fn from(f: Filter) -> Self {
        Cond::Extend(f)
    }
}

/// The operator of a stub, or a reference to the previous rule's.
#[derive(Debug, Clone)]
pub enum OpRef {
    Op(Operator),
    Same,
}

impl From<Operator> for OpRef {
    fn from(op: Operator) -> Self {
        OpRef::Op(op)
    }
}

/// A terse rule declaration, resolved against its section's [`Inherit`].
#[derive(Debug, Clone)]
pub struct RuleStub {
    pub name: String,
    /// Left context, nearest term last. Empty means `[Base]`.
    pub left: Vec<Cond>,
    pub center: Cond,
    /// Right context, nearest term first. Empty means `[Base]`.
    pub right: Vec<Cond>,
    pub operator: OpRef,
    pub flags: StubFlags,
    pub priority: u16,
}

impl RuleStub {
    pub fn new(name: &str, operator: impl Into<OpRef>) -> Self {
        RuleStub {
            name: name.to_string(),
            left: Vec::new(),
            center: Cond::Base,
            right: Vec::new(),
            operator: operator.into(),
            flags: StubFlags::empty(),
            priority: 0,
        }
    }
}

/// Shared defaults for a contiguous block of stubs.
#[derive(Debug, Clone)]
pub struct Inherit {
    pub left: Filter,
    pub center: Filter,
    pub right: Filter,
    pub locus: Locus,
    /// Overrides the derived category (tag rules stay `Samjna` regardless).
    pub category: Option<RuleCategory>,
}

impl Default for Inherit {
    fn default() -> Self {
        Inherit {
            left: Filter::allow_all(),
            center: Filter::allow_all(),
            right: Filter::allow_all(),
            locus: Locus::default(),
            category: None,
        }
    }
}

impl Inherit {
    pub fn new(left: Filter, center: Filter, right: Filter) -> Self {
        Inherit { left, center, right, ..Inherit::default() }
    }

    pub fn with_locus(mut self, locus: Locus) -> Self {
        self.locus = locus;
        self
    }

    pub fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// A block of stubs sharing one [`Inherit`].
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub inherit: Inherit,
    pub stubs: Vec<RuleStub>,
}

impl Section {
    pub fn new(inherit: Inherit, stubs: Vec<RuleStub>) -> Self {
        Section { inherit, stubs }
    }
}
