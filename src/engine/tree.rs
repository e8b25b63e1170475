//! Rule index.
//!
//! A [`RuleTree`] partitions the rule table by *features*: `(filter, slot)`
//! pairs drawn from rule windows, with nested ANDs flattened. At each level:
//!
//! 1. every rule is bucketed under each feature it has that no ancestor used,
//! 2. rules with no such feature stay at this level (the residual list),
//! 3. buckets are visited largest-first; each rule goes into the first bucket
//!    that holds it and the bucket becomes a subtree keyed by its feature.
//!
//! ```text
//! [2] [7.3.84, 1.3.1]                      residual
//! [5] (tag(anga), 0)
//!     [1] [6.4.1]
//!     [4] (tag(sarvadhatuka), 1)
//!         [2] (last(iu), 0) ...
//! ```
//!
//! Every rule in a subtree has that subtree's feature, and a rule can only
//! match if all of its features hold. [`RuleTree::select`] therefore only
//! descends into subtrees whose feature holds and never misses a matching rule.
//! The result is a superset; [`Rule::matches`] still does the exact test.

use crate::filter::Filter;
use crate::rule::Rule;
use crate::state::State;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;

/// Rule identifier (index into the engine's rule vector).
pub type RuleId = usize;

type Feature = (Filter, usize);

/// Recursive discriminating index over a rule table.
#[derive(Debug, Default)]
pub struct RuleTree {
    rules: Vec<RuleId>,
    features: IndexMap<Feature, RuleTree>,
}

impl RuleTree {
    /// Index `rules`. Ids in the tree are positions in this slice.
    pub fn new(rules: &[Rule]) -> RuleTree {
        let features: Vec<Vec<Feature>> = rules.iter().map(Rule::features).collect();
        let ids: Vec<RuleId> = (0..rules.len()).collect();
        RuleTree::build(&features, &ids, &HashSet::new())
    }

    fn build(features: &[Vec<Feature>], ids: &[RuleId], used: &HashSet<Feature>) -> RuleTree {
        let mut residual = Vec::new();
        let mut buckets: IndexMap<Feature, Vec<RuleId>> = IndexMap::new();
        for &id in ids {
            let mut bucketed = false;
            for feat in &features[id] {
                if !used.contains(feat) {
                    buckets.entry(feat.clone()).or_default().push(id);
                    bucketed = true;
                }
            }
            if !bucketed {
                residual.push(id);
            }
        }

        // Largest first; equal sizes keep first-seen order.
        let mut buckets: Vec<(Feature, Vec<RuleId>)> = buckets.into_iter().collect();
        buckets.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let mut seen: HashSet<RuleId> = HashSet::new();
        let mut children = IndexMap::new();
        for (feat, members) in buckets {
            let unseen: Vec<RuleId> = members.iter().copied().filter(|id| !seen.contains(id)).collect();
            if unseen.is_empty() {
                continue;
            }
            seen.extend(unseen.iter().copied());
            let mut used = used.clone();
            used.insert(feat.clone());
            children.insert(feat, RuleTree::build(features, &unseen, &used));
        }

        RuleTree { rules: residual, features: children }
    }

    /// Append every rule that might match with its window starting at `start`.
    pub fn select_into(&self, state: &State, start: usize, out: &mut Vec<RuleId>) {
        out.extend_from_slice(&self.rules);
        for ((filter, slot), tree) in &self.features {
            if filter.allows(state, start + slot) {
                tree.select_into(state, start, out);
            }
        }
    }

    /// Ids of every rule that might match with its window starting at `start`.
    pub fn select(&self, state: &State, start: usize) -> Vec<RuleId> {
        let mut out = Vec::new();
        self.select_into(state, start, &mut out);
        out
    }

    /// Number of rules in the tree.
    pub fn len(&self) -> usize {
        self.rules.len() + self.features.values().map(RuleTree::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels, counting this one.
    pub fn depth(&self) -> usize {
        1 + self.features.values().map(RuleTree::depth).max().unwrap_or(0)
    }

    /// Pretty-printer that resolves rule ids against `rules`.
    pub fn display<'a>(&'a self, rules: &'a [Rule]) -> TreeDisplay<'a> {
        TreeDisplay { tree: self, rules }
    }
}

pub struct TreeDisplay<'a> {
    tree: &'a RuleTree,
    rules: &'a [Rule],
}

impl TreeDisplay<'_> {
    fn write(&self, f: &mut fmt::Formatter<'_>, tree: &RuleTree, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        if !tree.rules.is_empty() {
            let names: Vec<&str> = tree.rules.iter().filter_map(|&id| self.rules.get(id)).map(Rule::name).collect();
            writeln!(f, "{pad}[{}] {names:?}", tree.rules.len())?;
        }
        for ((filter, slot), child) in &tree.features {
            writeln!(f, "{pad}[{}] ({filter}, {slot})", child.len())?;
            self.write(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, self.tree, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use crate::term::Term;
    use proptest::prelude::*;

    fn rule(name: &str, center: Filter, right: Vec<Filter>) -> Rule {
        Rule::new(name, vec![], Some(center), right, Operator::set_last(name, "a")).unwrap()
    }

    fn table() -> Vec<Rule> {
        vec![
            rule("1", Filter::tag(["anga"]), vec![Filter::tag(["sarvadhatuka"])]),
            rule("2", Filter::tag(["anga"]) & Filter::last("iu"), vec![Filter::tag(["sarvadhatuka"])]),
            rule("3", Filter::tag(["anga"]) & Filter::last("i"), vec![]),
            rule("4", Filter::allow_all(), vec![]),
            rule("5", Filter::tag(["dhatu"]), vec![Filter::tag(["ardhadhatuka"])]),
            rule("6", Filter::state("next_is_i", |s, i| s.get(i + 1).is_some_and(|t| t.value() == "i")), vec![]),
        ]
    }

    fn state(items: &[(&str, &[&str])]) -> State {
        State::new(items.iter().map(|(v, tags)| Term::new(*v).add_tags(tags.iter().copied())).collect())
    }

    #[test]
    fn every_rule_is_indexed_once() {
        let rules = table();
        let tree = RuleTree::new(&rules);
        assert_eq!(tree.len(), rules.len());
        assert!(tree.depth() >= 2);
        let mut all = tree.select(&state(&[("x", &[])]), 0);
        all.sort_unstable();
        all.dedup();
        assert!(all.len() <= rules.len());
    }

    #[test]
    fn selection_prunes_and_never_misses() {
        let rules = table();
        let tree = RuleTree::new(&rules);
        let s = state(&[("Bu", &["anga", "dhatu"]), ("ti", &["sarvadhatuka"])]);
        let picked = tree.select(&s, 0);
        for (id, r) in rules.iter().enumerate() {
            if r.matches(&s, 0) {
                assert!(picked.contains(&id), "rule {} matched but was not selected", r.name());
            }
        }
        // "3" needs last(i), "5" needs ardhadhatuka on the right.
        let names: Vec<&str> = picked.iter().map(|&id| rules[id].name()).collect();
        assert!(!names.contains(&"5"));
    }

    #[test]
    fn display_lists_features() {
        let rules = table();
        let tree = RuleTree::new(&rules);
        let out = tree.display(&rules).to_string();
        assert!(out.contains("(tag(anga), 0)"));
        assert!(out.contains("\"4\""));
    }

    fn arb_term() -> impl Strategy<Value = (String, Vec<&'static str>)> {
        (
            "[aiuk]{1,3}",
            proptest::sample::subsequence(vec!["anga", "dhatu", "sarvadhatuka", "ardhadhatuka"], 0..4),
        )
    }

    proptest! {
        #[test]
        fn select_is_a_superset_of_matching_rules(terms in proptest::collection::vec(arb_term(), 1..4)) {
            let rules = table();
            let tree = RuleTree::new(&rules);
            let s = State::new(
                terms.iter().map(|(v, tags)| Term::new(v.as_str()).add_tags(tags.iter().copied())).collect(),
            );
            for start in 0..s.len() {
                let picked = tree.select(&s, start);
                for (id, r) in rules.iter().enumerate() {
                    if r.matches(&s, start) {
                        prop_assert!(picked.contains(&id));
                    }
                }
            }
        }
    }
}
