//! The derivation engine and its depth-first search.
//!
//! [`Engine`] owns everything built once per rule table: the rules in
//! declaration order, the utsarga/apavada graph, and the [`RuleTree`] index.
//! [`Derivation`] is one lazy run of the search over that table.
//!
//! ## One step
//!
//! ```text
//! pop state
//!   for each start position:
//!       tree.select(state, start)            -> plausible rules
//!       drop rules whose anchor already ran  (idempotence)
//!       keep rules that match                -> candidates
//!   drop candidates whose apavada is also a candidate at the same operand
//!   sort: rank desc, declaration order, position
//!   apply the first candidate that yields anything
//!       -> push successors (declined first, so accepted is explored first)
//!   nothing applied -> terminal: emit the rendered form (once)
//! ```
//!
//! Operator failures are logged and the candidate is skipped. Visited states
//! are deduplicated by their terms (history ignored), so converging branches
//! are explored once.
//!
//! ## Termination
//!
//! Every applied rule either changes the terms or records itself on its anchor
//! term, which it then never matches again. With a finite rule table, each
//! branch therefore runs out of candidates. [`Options`] adds hard caps on top
//! for rule tables whose operators keep growing the state.

use super::dedup::Seen;
use super::expand::expand;
use super::inference::{infer, sort_rules};
use super::metrics::DeriveMetrics;
use super::tree::{RuleId, RuleTree};
use crate::api::Options;
use crate::error::BuildError;
use crate::rule::{Outcome, Outcomes, Rule};
use crate::state::State;
use crate::stub::Section;
use crate::term::Term;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// A built rule table, ready to derive.
///
/// Build it once and share it by reference; every [`Derivation`] borrows it.
pub struct Engine {
    rules: Vec<Rule>,
    by_name: HashMap<Arc<str>, RuleId>,
    /// `apavada[id]`: ids of the rules that override rule `id`.
    apavada: Vec<Vec<RuleId>>,
    tree: RuleTree,
}

impl Engine {
    /// Expand `sections` into rules and build the engine.
    pub fn build(sections: &[Section]) -> Result<Engine, BuildError> {
        Engine::from_rules(expand(sections)?)
    }

    /// Build the engine from already constructed rules.
    ///
    /// Rules are reordered by declaration order of their names; inferred
    /// utsarga/apavada lists replace whatever the rules carried.
    pub fn from_rules(mut rules: Vec<Rule>) -> Result<Engine, BuildError> {
        let mut names = HashSet::with_capacity(rules.len());
        for rule in &rules {
            rule.validate()?;
            if !names.insert(rule.name()) {
                return Err(BuildError::DuplicateRule(rule.name().to_string()));
            }
        }

        sort_rules(&mut rules);
        let edges = infer(&mut rules);
        let by_name: HashMap<Arc<str>, RuleId> =
            rules.iter().enumerate().map(|(id, r)| (Arc::clone(r.name_arc()), id)).collect();
        let apavada: Vec<Vec<RuleId>> =
            rules.iter().map(|r| r.apavada().iter().filter_map(|n| by_name.get(n).copied()).collect()).collect();
        let tree = RuleTree::new(&rules);
        debug!(rules = rules.len(), edges, tree_depth = tree.depth(), "engine built");

        Ok(Engine { rules, by_name, apavada, tree })
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.by_name.get(name).map(|&id| &self.rules[id])
    }

    pub fn tree(&self) -> &RuleTree {
        &self.tree
    }

    /// Derive every terminal form of `terms`, lazily.
    pub fn derive(&self, terms: Vec<Term>) -> Derivation<'_> {
        self.derive_with_options(terms, &Options::default())
    }

    /// Like [`Engine::derive`], with exploration caps.
    pub fn derive_with_options(&self, terms: Vec<Term>, options: &Options) -> Derivation<'_> {
        Derivation::new(self, State::new(terms), options.clone())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").field("rules", &self.rules.len()).field("tree_depth", &self.tree.depth()).finish()
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree.display(&self.rules))
    }
}

/// One lazy derivation. Yields each distinct terminal form once.
///
/// Dropping it early abandons the rest of the search.
pub struct Derivation<'e> {
    engine: &'e Engine,
    stack: Vec<State>,
    seen: Seen,
    options: Options,
    metrics: DeriveMetrics,
    done: bool,
}

impl<'e> Derivation<'e> {
    fn new(engine: &'e Engine, root: State, options: Options) -> Self {
        let mut seen = Seen::default();
        let stack = if root.is_empty() {
            Vec::new()
        } else {
            seen.visit(&root);
            vec![root]
        };
        debug!(root = %stack.first().map(ToString::to_string).unwrap_or_default(), "derivation started");
        Derivation { engine, stack, seen, options, metrics: DeriveMetrics::default(), done: false }
    }

    pub fn metrics(&self) -> &DeriveMetrics {
        &self.metrics
    }

    /// States still waiting on the stack.
    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    /// Next terminal state with a form not emitted before.
    pub fn next_state(&mut self) -> Option<State> {
        if self.done {
            return None;
        }
        let started = Instant::now();
        let found = self.search();
        self.metrics.elapsed += started.elapsed();
        if found.is_none() {
            self.done = true;
            debug!(
                steps = self.metrics.steps,
                forms = self.metrics.forms,
                visited = self.seen.states(),
                "derivation finished"
            );
        }
        found
    }

    fn search(&mut self) -> Option<State> {
        loop {
            if self.options.max_results.is_some_and(|max| self.metrics.forms >= max) {
                self.metrics.truncated |= !self.stack.is_empty();
                return None;
            }
            let state = self.stack.pop()?;
            if self.options.max_steps.is_some_and(|max| self.metrics.steps >= max) {
                warn!(
                    steps = self.metrics.steps,
                    pending = self.stack.len() + 1,
                    "step budget exhausted; stopping derivation"
                );
                self.metrics.truncated = true;
                self.stack.clear();
                return None;
            }
            self.metrics.steps += 1;
            trace!(step = self.metrics.steps, state = %state, pending = self.stack.len(), "pop");

            match self.step(&state) {
                Some(outcomes) => self.push_all(outcomes),
                None => {
                    self.metrics.terminal += 1;
                    if self.seen.emit(&state.render()) {
                        self.metrics.forms += 1;
                        return Some(state);
                    }
                }
            }
        }
    }

    fn push_all(&mut self, outcomes: Outcomes) {
        for outcome in outcomes {
            let next = outcome.into_state();
            if !self.seen.visit(&next) {
                self.metrics.collapsed += 1;
                continue;
            }
            if self.options.max_frontier.is_some_and(|max| self.stack.len() >= max) {
                if self.metrics.pruned == 0 {
                    warn!(frontier = self.stack.len(), "frontier cap reached; dropping branches");
                }
                self.metrics.pruned += 1;
                self.metrics.truncated = true;
                continue;
            }
            self.stack.push(next);
        }
    }

    /// Rule/start pairs that match and have not run, best first.
    fn candidates(&mut self, state: &State) -> Vec<(RuleId, usize)> {
        let engine = self.engine;
        let mut selected = Vec::new();
        let mut candidates = Vec::new();
        for start in 0..state.len() {
            selected.clear();
            engine.tree.select_into(state, start, &mut selected);
            self.metrics.selected += selected.len();
            for &id in &selected {
                let rule = &engine.rules[id];
                if !rule.has_run(state, start) && rule.matches(state, start) {
                    candidates.push((id, start));
                }
            }
        }
        self.metrics.matched += candidates.len();

        candidates.sort_by(|a, b| {
            let (ra, rb) = (&engine.rules[a.0], &engine.rules[b.0]);
            rb.rank().cmp(&ra.rank()).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1))
        });
        candidates
    }

    /// Apply the first candidate that yields anything; `None` means terminal.
    ///
    /// A candidate is skipped while one of its apavadas is live at the same
    /// operand. A candidate whose operator fails stops being live, so the rules
    /// it overrode are reconsidered from the top, still in rank order.
    fn step(&mut self, state: &State) -> Option<Outcomes> {
        let engine = self.engine;
        let candidates = self.candidates(state);
        let operand = |&(id, start): &(RuleId, usize)| start + engine.rules[id].offset();
        let mut live: HashSet<(RuleId, usize)> = candidates.iter().map(|c| (c.0, operand(c))).collect();
        let mut tried = vec![false; candidates.len()];

        let found = 'scan: loop {
            for (k, cand) in candidates.iter().enumerate() {
                if tried[k] {
                    continue;
                }
                let (id, start) = *cand;
                let at = operand(cand);
                if engine.apavada[id].iter().any(|&a| live.contains(&(a, at))) {
                    continue;
                }
                tried[k] = true;
                let rule = &engine.rules[id];
                match rule.apply(state, start) {
                    Ok(outcomes) if outcomes.is_empty() => {
                        self.metrics.unchanged += 1;
                        trace!(rule = rule.name(), start, "no change; trying next candidate");
                    }
                    Ok(outcomes) => {
                        match outcomes.first() {
                            Some(Outcome::Blocked(_)) => self.metrics.blocked += 1,
                            Some(Outcome::Declined(_)) => self.metrics.optional += 1,
                            _ => self.metrics.applied += 1,
                        }
                        trace!(rule = rule.name(), start, branches = outcomes.len(), "applied");
                        break 'scan Some(outcomes);
                    }
                    Err(err) => {
                        self.metrics.operator_failures += 1;
                        warn!(rule = rule.name(), start, error = %err, "operator failed; rule skipped here");
                        live.remove(&(id, at));
                        continue 'scan;
                    }
                }
            }
            break None;
        };

        self.metrics.dominated += candidates
            .iter()
            .zip(&tried)
            .filter(|(c, tried)| !**tried && engine.apavada[c.0].iter().any(|&a| live.contains(&(a, operand(*c)))))
            .count();
        found
    }
}

impl Iterator for Derivation<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_state().map(|s| s.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperatorError;
    use crate::filter::Filter;
    use crate::operator::{Operator, Target};

    fn fail(s: &State) -> OperatorError {
        OperatorError::invalid("broken", &s.render(), "always fails")
    }

    fn rule(name: &str, center: Filter, op: Operator) -> Rule {
        Rule::new(name, vec![], Some(center), vec![], op).unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Engine::from_rules(vec![
            rule("1.1.1", Filter::allow_all(), Operator::set_value("a", "a")),
            rule("1.1.1", Filter::allow_all(), Operator::set_value("b", "b")),
        ])
        .unwrap_err();
        assert_eq!(err, BuildError::DuplicateRule("1.1.1".into()));
    }

    #[test]
    fn engine_is_ordered_and_indexed() {
        let engine = Engine::from_rules(vec![
            rule("6.1.2", Filter::tag(["b"]), Operator::set_value("b", "b")),
            rule("6.1.10", Filter::tag(["a"]), Operator::set_value("a", "a")),
        ])
        .unwrap();
        let names: Vec<&str> = engine.rules().iter().map(Rule::name).collect();
        assert_eq!(names, vec!["6.1.2", "6.1.10"]);
        assert!(engine.rule("6.1.10").is_some());
        assert_eq!(engine.tree().len(), 2);
        assert!(engine.to_string().contains("tag(a)"));
    }

    #[test]
    fn empty_input_yields_nothing() {
        let engine = Engine::from_rules(vec![rule("1", Filter::allow_all(), Operator::set_value("x", "x"))]).unwrap();
        assert_eq!(engine.derive(Vec::new()).count(), 0);
    }

    #[test]
    fn chain_runs_to_fixpoint() {
        let engine = Engine::from_rules(vec![
            rule("1", Filter::value(["a"]), Operator::set_value("ab", "b")),
            rule("2", Filter::value(["b"]), Operator::set_value("bc", "c")),
        ])
        .unwrap();
        let mut run = engine.derive(vec![Term::new("a")]);
        assert_eq!(run.next().as_deref(), Some("c"));
        assert_eq!(run.next(), None);
        assert_eq!(run.metrics().applied, 2);
        assert_eq!(run.metrics().forms, 1);
    }

    #[test]
    fn operator_failure_is_skipped() {
        let engine = Engine::from_rules(vec![
            rule("1", Filter::allow_all(), Operator::custom("broken", |s, _, _| Err(fail(s)))).with_priority(1),
            rule("2", Filter::value(["a"]), Operator::set_value("v", "z")),
        ])
        .unwrap();
        let mut run = engine.derive(vec![Term::new("a")]);
        assert_eq!(run.next().as_deref(), Some("z"));
        assert!(run.metrics().operator_failures >= 1);
    }

    #[test]
    fn failing_override_gives_way_to_its_general_rule() {
        let general = rule("7.3.84", Filter::tag(["anga"]), Operator::set_last("guna", "o"));
        let specific = rule(
            "7.3.89",
            Filter::tag(["anga"]) & Filter::last("u"),
            Operator::substitute("vrddhi", Target::Last, |t, _| {
                Err(OperatorError::invalid("vrddhi", t.value(), "no slot"))
            }),
        );
        let engine = Engine::from_rules(vec![general, specific]).unwrap();
        let apavada: Vec<&str> = engine.rule("7.3.84").unwrap().apavada().iter().map(|a| &**a).collect();
        assert_eq!(apavada, vec!["7.3.89"]);

        let mut run = engine.derive(vec![Term::new("Bu").add_tags(["anga"])]);
        let forms: Vec<String> = run.by_ref().collect();
        assert_eq!(forms, vec!["Bo".to_string()]);
        assert_eq!(run.metrics().operator_failures, 1);
        assert_eq!(run.metrics().dominated, 0);
    }

    #[test]
    fn live_override_still_dominates() {
        let engine = Engine::from_rules(vec![
            rule("7.3.84", Filter::tag(["anga"]), Operator::set_last("guna", "o")),
            rule("7.3.89", Filter::tag(["anga"]) & Filter::last("u"), Operator::set_last("vrddhi", "O")),
        ])
        .unwrap();
        let mut run = engine.derive(vec![Term::new("Bu").add_tags(["anga"])]);
        assert_eq!(run.next().as_deref(), Some("BO"));
        assert_eq!(run.metrics().dominated, 1);
    }

    #[test]
    fn step_budget_truncates() {
        let engine = Engine::from_rules(vec![
            rule("1", Filter::value(["a"]), Operator::set_value("ab", "b")),
            rule("2", Filter::value(["b"]), Operator::set_value("bc", "c")),
        ])
        .unwrap();
        let mut run = engine.derive_with_options(vec![Term::new("a")], &Options::default().with_max_steps(1));
        assert_eq!(run.next(), None);
        assert!(run.metrics().truncated);
        assert_eq!(run.metrics().steps, 1);
    }
}
