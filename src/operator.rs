//! Operators: the transformations rules perform.
//!
//! The engine treats an [`Operator`] as opaque except for two things: its
//! [`OpKind`] (what shape of edit it makes) and its explicit conflict
//! [`Category`] (which other operators it competes with). Two rules can only be
//! in an utsarga/apavada relation if their operators' categories conflict.
//!
//! Operator bodies are pure: same input, same output. Failure on a term that the
//! operator cannot handle is reported as an [`OperatorError`] and the search
//! treats the rule as non-matching there.

use crate::error::{BuildError, OperatorError};
use crate::state::State;
use crate::term::{Locus, Space, Term};
use std::fmt;
use std::sync::Arc;

pub type SubstituteFn = Arc<dyn Fn(&Term, Locus) -> Result<Term, OperatorError> + Send + Sync>;
pub type StateFn = Arc<dyn Fn(&State, usize, Locus) -> Result<State, OperatorError> + Send + Sync>;

/// Which part of the operand a substitution rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Whole,
    First,
    Last,
    Penultimate,
}

/// Conflict category. Only categories decide whether two operators compete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Substitute(Target),
    Insert,
    Tag(Arc<str>),
    Custom(Arc<str>),
}

impl Category {
    /// Whether two operators in these categories compete for the same operand.
    ///
    /// Substitutions compete when they touch the same part of the term or when
    /// either rewrites the whole term.
    pub fn conflicts_with(&self, other: &Category) -> bool {
        match (self, other) {
            (Category::Substitute(a), Category::Substitute(b)) => {
                a == b || *a == Target::Whole || *b == Target::Whole
            }
            (Category::Insert, Category::Insert) => true,
            (Category::Tag(a), Category::Tag(b)) => a == b,
            (Category::Custom(a), Category::Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Substitute(t) => write!(f, "substitute:{t:?}"),
            Category::Insert => f.write_str("insert"),
            Category::Tag(group) => write!(f, "tag:{group}"),
            Category::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// The closed set of edit shapes.
#[derive(Clone)]
pub enum OpKind {
    /// Rewrite the operand term; the body writes into the rule's locus.
    Substitute(SubstituteFn),
    /// Insert a new term at the operand position.
    Insert(Term),
    /// Add designations to the operand.
    AddTags(Vec<String>),
    /// Remove the operand. The following term keeps its raw value as a lakshana.
    Elide,
    /// Arbitrary state edit.
    Custom(StateFn),
}

impl OpKind {
    fn label(&self) -> &'static str {
        match self {
            OpKind::Substitute(_) => "substitute",
            OpKind::Insert(_) => "insert",
            OpKind::AddTags(_) => "add_tags",
            OpKind::Elide => "elide",
            OpKind::Custom(_) => "custom",
        }
    }

    fn admits(&self, category: &Category) -> bool {
        matches!(
            (self, category),
            (OpKind::Substitute(_) | OpKind::Elide, Category::Substitute(_))
                | (OpKind::Insert(_), Category::Insert)
                | (OpKind::AddTags(_), Category::Tag(_))
                | (OpKind::Custom(_), _)
        )
    }
}

struct OperatorData {
    name: Arc<str>,
    category: Category,
    kind: OpKind,
}

/// A named transformation with an explicit conflict category.
#[derive(Clone)]
pub struct Operator(Arc<OperatorData>);

impl Operator {
    /// Build an operator, checking that `kind` and `category` fit together.
    pub fn new(name: &str, category: Category, kind: OpKind) -> Result<Operator, BuildError> {
        if !kind.admits(&category) {
            return Err(BuildError::CategoryMismatch {
                operator: name.to_string(),
                kind: kind.label(),
                category: category.to_string(),
            });
        }
        Ok(Operator::unchecked(name, category, kind))
    }

    fn unchecked(name: &str, category: Category, kind: OpKind) -> Operator {
        Operator(Arc::new(OperatorData { name: Arc::from(name), category, kind }))
    }

    /// General substitution on `target`.
    pub fn substitute<F>(name: &str, target: Target, f: F) -> Operator
    where
        F: Fn(&Term, Locus) -> Result<Term, OperatorError> + Send + Sync + 'static,
    {
        Operator::unchecked(name, Category::Substitute(target), OpKind::Substitute(Arc::new(f)))
    }

    /// Replace the whole value with `value`.
    pub fn set_value(name: &str, value: &str) -> Operator {
        let value = value.to_string();
        Operator::substitute(name, Target::Whole, move |t, locus| Ok(t.set_at(locus, &value)))
    }

    /// Replace the final sound with `sound`.
    pub fn set_last(name: &str, sound: &str) -> Operator {
        Operator::sound_edit(name, Target::Last, sound, |len| len.checked_sub(1))
    }

    /// Replace the first sound with `sound`.
    pub fn set_first(name: &str, sound: &str) -> Operator {
        Operator::sound_edit(name, Target::First, sound, |len| (len > 0).then_some(0))
    }

    /// Replace the penultimate sound with `sound`.
    pub fn set_penultimate(name: &str, sound: &str) -> Operator {
        Operator::sound_edit(name, Target::Penultimate, sound, |len| len.checked_sub(2))
    }

    fn sound_edit(name: &str, target: Target, sound: &str, pick: fn(usize) -> Option<usize>) -> Operator {
        let sound = sound.to_string();
        let op_name = name.to_string();
        Operator::substitute(name, target, move |t, locus| {
            let current = t.get(Space::from(locus));
            let chars: Vec<char> = current.chars().collect();
            let Some(at) = pick(chars.len()) else {
                return Err(OperatorError::invalid(&op_name, current, format!("no {target:?} sound")));
            };
            let mut next: String = chars[..at].iter().collect();
            next.push_str(&sound);
            next.extend(&chars[at + 1..]);
            Ok(t.set_at(locus, &next))
        })
    }

    /// Insert `term` at the operand position.
    pub fn insert(name: &str, term: Term) -> Operator {
        Operator::unchecked(name, Category::Insert, OpKind::Insert(term))
    }

    /// Add `tags` to the operand. `group` names the conflict category.
    pub fn add_tags<I, S>(name: &str, group: &str, tags: I) -> Operator
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        Operator::unchecked(name, Category::Tag(Arc::from(group)), OpKind::AddTags(tags))
    }

    /// Remove the operand.
    pub fn elide(name: &str) -> Operator {
        Operator::unchecked(name, Category::Substitute(Target::Whole), OpKind::Elide)
    }

    /// Arbitrary state edit in its own conflict category.
    pub fn custom<F>(name: &str, f: F) -> Operator
    where
        F: Fn(&State, usize, Locus) -> Result<State, OperatorError> + Send + Sync + 'static,
    {
        Operator::unchecked(name, Category::Custom(Arc::from(name)), OpKind::Custom(Arc::new(f)))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn category(&self) -> &Category {
        &self.0.category
    }

    pub fn kind(&self) -> &OpKind {
        &self.0.kind
    }

    pub fn is_insert(&self) -> bool {
        matches!(self.0.kind, OpKind::Insert(_))
    }

    pub fn conflicts_with(&self, other: &Operator) -> bool {
        self.0.category.conflicts_with(&other.0.category)
    }

    fn operand<'s>(&self, state: &'s State, index: usize) -> Result<&'s Term, OperatorError> {
        state.get(index).ok_or_else(|| OperatorError::OutOfRange { operator: self.name().to_string(), index })
    }

    /// Apply at `index`, writing into `locus`.
    pub fn apply(&self, state: &State, index: usize, locus: Locus) -> Result<State, OperatorError> {
        match &self.0.kind {
            OpKind::Substitute(f) => {
                let term = self.operand(state, index)?;
                Ok(state.swap(index, f(term, locus)?))
            }
            OpKind::Insert(term) => {
                if index > state.len() {
                    return Err(OperatorError::OutOfRange { operator: self.name().to_string(), index });
                }
                Ok(state.insert(index, term.clone()))
            }
            OpKind::AddTags(tags) => {
                let term = self.operand(state, index)?;
                Ok(state.swap(index, term.add_tags(tags.iter().cloned())))
            }
            OpKind::Elide => {
                let raw = self.operand(state, index)?.raw().to_string();
                let removed = state.remove(index);
                match removed.get(index) {
                    Some(next) => {
                        let next = next.add_lakshana(raw);
                        Ok(removed.swap(index, next))
                    }
                    None => Ok(removed),
                }
            }
            OpKind::Custom(f) => f(state, index, locus),
        }
    }

    /// The state a declined optional application leaves behind.
    ///
    /// Declining a tag assignment also takes those tags away from the operand.
    pub fn decline(&self, state: &State, index: usize) -> State {
        match (&self.0.kind, state.get(index)) {
            (OpKind::AddTags(tags), Some(term)) => state.swap(index, term.remove_tags(tags)),
            _ => state.clone(),
        }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<op({}, {}, {})>", self.0.name, self.0.kind.label(), self.0.category)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(values: &[&str]) -> State {
        State::new(values.iter().map(|v| Term::new(*v)).collect())
    }

    #[test]
    fn categories_conflict_by_target() {
        let last = Category::Substitute(Target::Last);
        let first = Category::Substitute(Target::First);
        let whole = Category::Substitute(Target::Whole);
        assert!(last.conflicts_with(&last));
        assert!(!last.conflicts_with(&first));
        assert!(whole.conflicts_with(&first));
        assert!(Category::Insert.conflicts_with(&Category::Insert));
        assert!(!Category::Insert.conflicts_with(&last));
        assert!(Category::Tag(Arc::from("it")).conflicts_with(&Category::Tag(Arc::from("it"))));
        assert!(!Category::Tag(Arc::from("it")).conflicts_with(&Category::Tag(Arc::from("guna"))));
    }

    #[test]
    fn kind_and_category_must_agree() {
        let err = Operator::new("x", Category::Insert, OpKind::AddTags(vec!["a".into()])).unwrap_err();
        assert!(matches!(err, BuildError::CategoryMismatch { kind: "add_tags", .. }));
        assert!(Operator::new("y", Category::Insert, OpKind::Insert(Term::new("i"))).is_ok());
        let identity = OpKind::Custom(Arc::new(|s: &State, _: usize, _: Locus| Ok(s.clone())));
        assert!(Operator::new("z", Category::Tag(Arc::from("g")), identity).is_ok());
    }

    #[test]
    fn sound_edits_write_the_locus() {
        let s = state(&["Bu"]);
        let out = Operator::set_last("guna", "o").apply(&s, 0, Locus::Value).unwrap();
        assert_eq!(out.render(), "Bo");
        let iso = Operator::set_first("x", "p").apply(&s, 0, Locus::Asiddhavat).unwrap();
        assert_eq!(iso.get(0).unwrap().value(), "Bu");
        assert_eq!(iso.render(), "pu");
        let pen = Operator::set_penultimate("y", "A").apply(&state(&["pat"]), 0, Locus::Value).unwrap();
        assert_eq!(pen.render(), "pAt");
    }

    #[test]
    fn sound_edits_reject_short_terms() {
        let err = Operator::set_penultimate("y", "A").apply(&state(&["a"]), 0, Locus::Value).unwrap_err();
        assert!(matches!(err, OperatorError::InvalidTerm { .. }));
        let err = Operator::set_last("z", "a").apply(&state(&["a"]), 3, Locus::Value).unwrap_err();
        assert_eq!(err, OperatorError::OutOfRange { operator: "z".into(), index: 3 });
    }

    #[test]
    fn insert_elide_and_tags() {
        let s = state(&["kf", "ta"]);
        assert_eq!(Operator::insert("iw", Term::new("i")).apply(&s, 1, Locus::Value).unwrap().render(), "kfita");
        assert_eq!(Operator::insert("end", Term::new("s")).apply(&s, 2, Locus::Value).unwrap().render(), "kftas");

        let gone = Operator::elide("lopa").apply(&s, 0, Locus::Value).unwrap();
        assert_eq!(gone.render(), "ta");
        assert!(gone.get(0).unwrap().lakshana().contains("kf"));

        let tag = Operator::add_tags("samjna", "pada", ["pada"]);
        let tagged = tag.apply(&s, 1, Locus::Value).unwrap();
        assert!(tagged.get(1).unwrap().has_tag("pada"));
        assert!(!tag.decline(&tagged, 1).get(1).unwrap().has_tag("pada"));
        assert_eq!(Operator::set_value("v", "x").decline(&s, 0), s);
    }
}
