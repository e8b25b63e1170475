//! Filter algebra.
//!
//! A [`Filter`] is a named predicate over `(State, position)`. Besides its body,
//! every filter carries:
//!
//! - a **domain**: the concrete set of values it admits (used only to compare
//!   specificity between filters, never to evaluate them),
//! - a **rank** derived from the domain size (see [`crate::rank`]),
//! - a **category** naming its family (`last`, `tag`, `and`, ...).
//!
//! Filters compose with `&`, `|` and `!`. Composition keeps the conjuncts
//! recoverable ([`Filter::supersets`]) so the rule index can bucket rules by
//! their indivisible features and inference can compare windows with
//! [`Filter::subset_of`].
//!
//! ## Term filters and caching
//!
//! Most filters only look at the term under the cursor. Those are built with a
//! term-level body and their results are cached on the [`Term`] itself, keyed by
//! filter name. Two filters with the same name must therefore behave the same;
//! the parameterized constructors guarantee this by deriving the name from their
//! arguments. State-level filters (which may look at neighbours) are never cached.
//!
//! Every filter rejects positions past the end of the state.

use crate::rank::Rank;
use crate::state::State;
use crate::term::{Space, Term};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

pub type TermPredicate = Arc<dyn Fn(&Term) -> bool + Send + Sync>;
pub type StatePredicate = Arc<dyn Fn(&State, usize) -> bool + Send + Sync>;

/// Filter family. Domains are only comparable within one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterCategory {
    Raw,
    Value,
    Lakshana,
    Tag,
    Part,
    First,
    Last,
    Penultimate,
    Contains,
    Pattern,
    Custom,
    AllowAll,
    Never,
    And,
    Or,
    Not,
}

/// The value set a filter restricts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    Unbounded,
    Names(BTreeSet<String>),
    Sounds(BTreeSet<char>),
    Members(Vec<Filter>),
}

impl Domain {
    fn len(&self) -> usize {
        match self {
            Domain::Unbounded => 0,
            Domain::Names(names) => names.len(),
            Domain::Sounds(sounds) => sounds.len(),
            Domain::Members(members) => members.len(),
        }
    }
}

enum Body {
    Term(TermPredicate),
    State(StatePredicate),
}

struct FilterData {
    name: Arc<str>,
    category: FilterCategory,
    domain: Domain,
    rank: Rank,
    body: Body,
    supersets: OnceCell<Vec<Filter>>,
}

/// A named, rankable, composable predicate over `(State, position)`.
#[derive(Clone)]
pub struct Filter(Arc<FilterData>);

fn joined<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn name_set<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

fn sound_set(sounds: &str) -> BTreeSet<char> {
    sounds.chars().filter(|c| !c.is_whitespace()).collect()
}

impl Filter {
    fn build(name: String, category: FilterCategory, domain: Domain, rank: Rank, body: Body) -> Filter {
        Filter(Arc::new(FilterData {
            name: Arc::from(name),
            category,
            domain,
            rank,
            body,
            supersets: OnceCell::new(),
        }))
    }

    fn names<F>(label: &str, category: FilterCategory, names: BTreeSet<String>, test: F) -> Filter
    where
        F: Fn(&BTreeSet<String>, &Term) -> bool + Send + Sync + 'static,
    {
        let name = format!("{label}({})", joined(&names));
        let rank = match category {
            FilterCategory::Tag | FilterCategory::Part => Rank::with_tag(names.len()),
            _ => Rank::with_upadesha(names.len()),
        };
        let set = names.clone();
        let body = Body::Term(Arc::new(move |t: &Term| test(&set, t)));
        Filter::build(name, category, Domain::Names(names), rank, body)
    }

    fn sounds<F>(label: &str, category: FilterCategory, sounds: &str, check: F) -> Filter
    where
        F: Fn(&BTreeSet<char>, &Term) -> bool + Send + Sync + 'static,
    {
        let set = sound_set(sounds);
        let name = format!("{label}({})", set.iter().collect::<String>());
        let rank = Rank::with_sound(set.len());
        let domain = Domain::Sounds(set.clone());
        let body = Body::Term(Arc::new(move |t: &Term| check(&set, t)));
        Filter::build(name, category, domain, rank, body)
    }

    // --- Parameterized filters ------------------------------------------------

    /// Term's raw value is one of `names`.
    pub fn raw<I, S>(names: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::names("raw", FilterCategory::Raw, name_set(names), |set, t| set.contains(t.raw()))
    }

    /// Term's current value is one of `names`.
    pub fn value<I, S>(names: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::names("value", FilterCategory::Value, name_set(names), |set, t| set.contains(t.value()))
    }

    /// Term previously answered to one of `names`.
    pub fn lakshana<I, S>(names: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::names("lakshana", FilterCategory::Lakshana, name_set(names), |set, t| {
            t.lakshana().iter().any(|l| set.contains(l))
        })
    }

    /// Term carries any of the designations in `tags`.
    pub fn tag<I, S>(tags: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::names("tag", FilterCategory::Tag, name_set(tags), |set, t| t.tags().iter().any(|x| set.contains(x)))
    }

    /// Term has received any of the augments in `parts`.
    pub fn part<I, S>(parts: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::names("part", FilterCategory::Part, name_set(parts), |set, t| {
            t.parts().iter().any(|p| set.contains(p))
        })
    }

    /// First sound of the value is in `sounds` (whitespace ignored).
    pub fn first(sounds: &str) -> Filter {
        Filter::sounds("first", FilterCategory::First, sounds, |set, t| {
            t.first(Space::Value).is_some_and(|c| set.contains(&c))
        })
    }

    /// Final sound of the value is in `sounds`.
    pub fn last(sounds: &str) -> Filter {
        Filter::sounds("last", FilterCategory::Last, sounds, |set, t| {
            t.last(Space::Value).is_some_and(|c| set.contains(&c))
        })
    }

    /// Penultimate sound of the value is in `sounds`.
    pub fn penultimate(sounds: &str) -> Filter {
        Filter::sounds("penultimate", FilterCategory::Penultimate, sounds, |set, t| {
            t.penultimate(Space::Value).is_some_and(|c| set.contains(&c))
        })
    }

    /// Value contains at least one sound from `sounds`.
    pub fn contains(sounds: &str) -> Filter {
        Filter::sounds("contains", FilterCategory::Contains, sounds, |set, t| {
            t.value().chars().any(|c| set.contains(&c))
        })
    }

    /// Value matches a regular expression.
    pub fn pattern(re: &'static Regex) -> Filter {
        let source = re.as_str().to_string();
        let name = format!("pattern({source})");
        let domain = Domain::Names(BTreeSet::from([source]));
        let body = Body::Term(Arc::new(move |t: &Term| re.is_match(t.value())));
        Filter::build(name, FilterCategory::Pattern, domain, Rank::with_upadesha(1), body)
    }

    /// A named, unparameterized term predicate.
    pub fn term<F>(name: &str, f: F) -> Filter
    where
        F: Fn(&Term) -> bool + Send + Sync + 'static,
    {
        let body = Body::Term(Arc::new(f));
        Filter::build(name.to_string(), FilterCategory::Custom, Domain::Unbounded, Rank::default(), body)
    }

    /// A named predicate that may inspect the whole state (never cached).
    pub fn state<F>(name: &str, f: F) -> Filter
    where
        F: Fn(&State, usize) -> bool + Send + Sync + 'static,
    {
        let body = Body::State(Arc::new(f));
        Filter::build(name.to_string(), FilterCategory::Custom, Domain::Unbounded, Rank::default(), body)
    }

    /// Matches any existing term.
    pub fn allow_all() -> Filter {
        Filter::build(
            "allow_all".to_string(),
            FilterCategory::AllowAll,
            Domain::Unbounded,
            Rank::default(),
            Body::Term(Arc::new(|_| true)),
        )
    }

    /// Matches nothing.
    pub fn never() -> Filter {
        let body = Body::Term(Arc::new(|_| false));
        Filter::build("never".to_string(), FilterCategory::Never, Domain::Unbounded, Rank::default(), body)
    }

    // --- Combinators ----------------------------------------------------------

    fn term_bodies(filters: &[Filter]) -> Option<Vec<TermPredicate>> {
        filters
            .iter()
            .map(|f| match &f.0.body {
                Body::Term(b) => Some(Arc::clone(b)),
                Body::State(_) => None,
            })
            .collect()
    }

    /// Logical AND of `filters`.
    pub fn and(filters: &[Filter]) -> Filter {
        if let [only] = filters {
            return only.clone();
        }
        let name = format!("and({})", joined(filters));
        let rank = Rank::and(filters.iter().map(Filter::rank));
        let body = match Filter::term_bodies(filters) {
            Some(bodies) => Body::Term(Arc::new(move |t: &Term| bodies.iter().all(|b| b(t)))),
            None => {
                let members = filters.to_vec();
                Body::State(Arc::new(move |s: &State, i| members.iter().all(|f| f.allows(s, i))))
            }
        };
        Filter::build(name, FilterCategory::And, Domain::Members(filters.to_vec()), rank, body)
    }

    /// Logical OR of `filters`.
    pub fn or(filters: &[Filter]) -> Filter {
        if let [only] = filters {
            return only.clone();
        }
        let name = format!("or({})", joined(filters));
        let rank = Rank::or(filters.iter().map(Filter::rank));
        let body = match Filter::term_bodies(filters) {
            Some(bodies) => Body::Term(Arc::new(move |t: &Term| bodies.iter().any(|b| b(t)))),
            None => {
                let members = filters.to_vec();
                Body::State(Arc::new(move |s: &State, i| members.iter().any(|f| f.allows(s, i))))
            }
        };
        Filter::build(name, FilterCategory::Or, Domain::Members(filters.to_vec()), rank, body)
    }

    /// Logical NOT of `filter`. Still rejects positions with no term.
    pub fn negate(filter: &Filter) -> Filter {
        let name = format!("not({})", filter.name());
        let body = match &filter.0.body {
            Body::Term(b) => {
                let b = Arc::clone(b);
                Body::Term(Arc::new(move |t: &Term| !b(t)))
            }
            Body::State(_) => {
                let inner = filter.clone();
                Body::State(Arc::new(move |s: &State, i| !inner.allows(s, i)))
            }
        };
        Filter::build(name, FilterCategory::Not, Domain::Members(vec![filter.clone()]), filter.rank(), body)
    }

    // --- Accessors ------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn category(&self) -> FilterCategory {
        self.0.category
    }

    pub fn domain(&self) -> &Domain {
        &self.0.domain
    }

    pub fn rank(&self) -> Rank {
        self.0.rank
    }

    /// Component filters of an and/or/not filter; empty for leaves.
    pub fn members(&self) -> &[Filter] {
        match (&self.0.category, &self.0.domain) {
            (FilterCategory::And | FilterCategory::Or | FilterCategory::Not, Domain::Members(m)) => m,
            _ => &[],
        }
    }

    pub fn is_allow_all(&self) -> bool {
        self.0.category == FilterCategory::AllowAll
    }

    pub fn domain_len(&self) -> usize {
        self.0.domain.len()
    }

    // --- Evaluation -----------------------------------------------------------

    /// Evaluate at `index`. Positions with no term are always rejected.
    pub fn allows(&self, state: &State, index: usize) -> bool {
        let Some(term) = state.get(index) else {
            return false;
        };
        match &self.0.body {
            Body::Term(body) => term.cached(&self.0.name, |t| body(t)),
            Body::State(body) => body(state, index),
        }
    }

    /// Evaluate against a lone term.
    pub fn allows_term(&self, term: &Term) -> bool {
        self.allows(&State::new(vec![term.clone()]), 0)
    }

    // --- Set reasoning --------------------------------------------------------

    /// The indivisible conjuncts of this filter (nested ANDs flattened).
    ///
    /// OR and NOT filters are treated as indivisible.
    pub fn feature_sets(&self) -> Vec<Filter> {
        let mut stack = vec![self.clone()];
        let mut out: Vec<Filter> = Vec::new();
        while let Some(cur) = stack.pop() {
            if cur.category() == FilterCategory::And {
                stack.extend(cur.members().iter().rev().cloned());
            } else if !out.contains(&cur) {
                out.push(cur);
            }
        }
        out
    }

    /// The interesting supersets of this filter: its conjuncts, minus `allow_all`.
    pub fn supersets(&self) -> &[Filter] {
        self.0.supersets.get_or_init(|| self.feature_sets().into_iter().filter(|f| !f.is_allow_all()).collect())
    }

    /// Whether this filter's domain is contained in `other`'s (same category assumed).
    ///
    /// Custom predicates have no comparable domain: each is only a subset of itself.
    pub fn domain_subset_of(&self, other: &Filter) -> bool {
        if matches!(self.0.domain, Domain::Unbounded) || matches!(other.0.domain, Domain::Unbounded) {
            return self == other;
        }
        if self.0.domain == other.0.domain {
            return true;
        }
        match (self.category(), &self.0.domain, &other.0.domain) {
            (_, Domain::Names(a), Domain::Names(b)) => a.is_subset(b),
            (_, Domain::Sounds(a), Domain::Sounds(b)) => a.is_subset(b),
            // not(x) ⊆ not(y) iff y ⊆ x
            (FilterCategory::Not, Domain::Members(a), Domain::Members(b)) => match (a.as_slice(), b.as_slice()) {
                ([x], [y]) => y.subset_of(x),
                _ => false,
            },
            (FilterCategory::Or, Domain::Members(a), Domain::Members(b)) => {
                a.iter().all(|m| b.iter().any(|n| m == n || m.subset_of(n)))
            }
            _ => false,
        }
    }

    /// Whether `self` holding implies `other` holding.
    ///
    /// Every feature required by `other` must be implied by some feature of
    /// `self`: by identity, by membership in an OR feature, or by domain
    /// containment within the same category.
    pub fn subset_of(&self, other: &Filter) -> bool {
        let s_sets = self.supersets();
        other.supersets().iter().all(|o| {
            if s_sets.contains(o) {
                return true;
            }
            let implies_member = |s: &Filter| {
                o.members().iter().any(|m| m == s || (m.category() == s.category() && s.domain_subset_of(m)))
            };
            if o.category() == FilterCategory::Or && s_sets.iter().any(implies_member) {
                return true;
            }
            s_sets.iter().any(|s| s.category() == o.category() && s.domain_subset_of(o))
        })
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.name == other.0.name && self.0.domain == other.0.domain)
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<f({})>", self.0.name)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        Filter::and(&[self, rhs])
    }
}

impl BitAnd for &Filter {
    type Output = Filter;

    fn bitand(self, rhs: &Filter) -> Filter {
        Filter::and(&[self.clone(), rhs.clone()])
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        Filter::or(&[self, rhs])
    }
}

impl BitOr for &Filter {
    type Output = Filter;

    fn bitor(self, rhs: &Filter) -> Filter {
        Filter::or(&[self.clone(), rhs.clone()])
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::negate(&self)
    }
}

impl Not for &Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        Filter::negate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn term(value: &str, tags: &[&str]) -> Term {
        Term::new(value).add_tags(tags.iter().copied())
    }

    #[test]
    fn leaf_filters_read_the_value_space() {
        let t = term("Bid", &["dhatu"]);
        assert!(Filter::last("d").allows_term(&t));
        assert!(Filter::first("B").allows_term(&t));
        assert!(Filter::penultimate("i u").allows_term(&t));
        assert!(Filter::contains("i").allows_term(&t));
        assert!(Filter::tag(["dhatu", "anga"]).allows_term(&t));
        assert!(!Filter::tag(["pratyaya"]).allows_term(&t));
        assert!(Filter::raw(["Bid"]).allows_term(&t));
        assert!(Filter::pattern(crate::regex!(r"^B.d$")).allows_term(&t));
    }

    #[test]
    fn missing_terms_are_rejected_even_by_negations() {
        let s = State::new(vec![Term::new("a")]);
        assert!(!Filter::allow_all().allows(&s, 1));
        assert!(!(!Filter::last("i")).allows(&s, 3));
        assert!((!Filter::last("i")).allows(&s, 0));
        let nbr = Filter::state("next_is_i", |s, i| s.get(i + 1).is_some_and(|t| t.value() == "i"));
        assert!(!(!nbr).allows(&s, 5));
    }

    #[test]
    fn names_identify_parameterized_filters() {
        assert_eq!(Filter::last("a i"), Filter::last("ia"));
        assert_eq!(Filter::tag(["b", "a"]).name(), "tag(a, b)");
        assert_eq!((Filter::tag(["a"]) & Filter::last("i")).name(), "and(tag(a), last(i))");
    }

    #[test]
    fn rank_grows_as_domain_shrinks() {
        assert!(Filter::last("i").rank() > Filter::last("iu").rank());
        let both = Filter::tag(["anga"]) & Filter::last("i");
        assert!(both.rank() > Filter::last("i").rank());
        assert_eq!((!Filter::last("i")).rank(), Filter::last("i").rank());
    }

    #[test]
    fn supersets_flatten_nested_ands_and_skip_allow_all() {
        let f = (Filter::tag(["anga"]) & Filter::last("i")) & (Filter::allow_all() & Filter::first("k"));
        let names: Vec<&str> = f.supersets().iter().map(Filter::name).collect();
        assert_eq!(names, vec!["tag(anga)", "last(i)", "first(k)"]);
        assert!(Filter::allow_all().supersets().is_empty());
        let or = Filter::tag(["a"]) | Filter::tag(["b"]);
        assert_eq!(or.supersets(), &[or.clone()]);
    }

    #[test]
    fn subset_by_identity_conjunction_and_domain() {
        let anga = Filter::tag(["anga"]);
        let anga_i = &anga & &Filter::last("i");
        assert!(anga_i.subset_of(&anga));
        assert!(!anga.subset_of(&anga_i));
        assert!(Filter::last("i").subset_of(&Filter::last("iu")));
        assert!(!Filter::last("iu").subset_of(&Filter::last("i")));
        assert!(!Filter::first("i").subset_of(&Filter::last("iu")));
        assert!(anga.subset_of(&Filter::allow_all()));
        assert!(!Filter::allow_all().subset_of(&anga));
    }

    #[test]
    fn subset_through_or_membership() {
        let either = Filter::raw(["BU"]) | Filter::tag(["dhatu"]);
        assert!(Filter::tag(["dhatu"]).subset_of(&either));
        assert!((Filter::raw(["BU"]) & Filter::last("U")).subset_of(&either));
        assert!(!Filter::tag(["anga"]).subset_of(&either));
        let wider = Filter::raw(["BU"]) | Filter::tag(["dhatu"]) | Filter::tag(["anga"]);
        assert!(either.subset_of(&wider));
    }

    #[test]
    fn distinct_custom_filters_are_unrelated() {
        let ends_t = Filter::term("ends_t", |t| t.value().ends_with('t'));
        let starts_k = Filter::term("starts_k", |t| t.value().starts_with('k'));
        assert!(!ends_t.subset_of(&starts_k));
        assert!(!starts_k.subset_of(&ends_t));
        assert!(ends_t.subset_of(&ends_t));
        assert!((&ends_t & &starts_k).subset_of(&starts_k));

        let next_is_i = Filter::state("next_is_i", |s, i| s.get(i + 1).is_some_and(|t| t.value() == "i"));
        assert!(!next_is_i.subset_of(&ends_t));
        assert!(!Filter::never().subset_of(&ends_t));
    }

    #[test]
    fn never_rejects_every_term() {
        let s = State::new(vec![term("a", &["anga"]), term("ti", &[])]);
        assert!(!Filter::never().allows(&s, 0));
        assert!(!Filter::never().allows(&s, 1));
        assert!((Filter::never() | Filter::tag(["anga"])).allows(&s, 0));
    }

    #[test]
    fn part_and_lakshana_filters() {
        let t = term("kf", &["dhatu"]).add_part("iw").set_raw("qukf\\Y");
        assert!(Filter::part(["iw", "sIyuw"]).allows_term(&t));
        assert!(!Filter::part(["sIyuw"]).allows_term(&t));
        assert!(Filter::lakshana(["kf"]).allows_term(&t));
        assert!(!Filter::lakshana(["Sap"]).allows_term(&t));
        assert!(Filter::part(["iw"]).subset_of(&Filter::part(["iw", "sIyuw"])));
    }

    #[test]
    fn subset_of_negations_reverses_containment() {
        let not_wide = !Filter::last("iu");
        let not_narrow = !Filter::last("i");
        assert!(not_wide.subset_of(&not_narrow));
        assert!(!not_narrow.subset_of(&not_wide));
    }

    #[test]
    fn state_filters_mix_with_term_filters() {
        let next_is_suffix =
            Filter::state("next_is_suffix", |s, i| s.get(i + 1).is_some_and(|t| t.has_tag("pratyaya")));
        let f = Filter::tag(["dhatu"]) & next_is_suffix;
        let s = State::new(vec![term("kf", &["dhatu"]), term("ti", &["pratyaya"])]);
        assert!(f.allows(&s, 0));
        assert!(!f.allows(&s, 1));
    }

    fn arb_sounds() -> impl Strategy<Value = String> {
        proptest::sample::subsequence(vec!['a', 'i', 'u', 'k', 't', 'n'], 1..6).prop_map(|v| v.into_iter().collect())
    }

    proptest! {
        #[test]
        fn subset_implies_evaluation(a in arb_sounds(), b in arb_sounds(), value in "[aiuktn]{1,4}") {
            let (fa, fb) = (Filter::last(&a), Filter::last(&b));
            let t = Term::new(value);
            if fa.subset_of(&fb) && fa.allows_term(&t) {
                prop_assert!(fb.allows_term(&t));
            }
        }

        #[test]
        fn conjunction_is_subset_of_each_side(a in arb_sounds(), b in arb_sounds()) {
            let (fa, fb) = (Filter::first(&a), Filter::last(&b));
            let both = &fa & &fb;
            prop_assert!(both.subset_of(&fa));
            prop_assert!(both.subset_of(&fb));
            prop_assert!(both.subset_of(&both));
        }
    }
}
