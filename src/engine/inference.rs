//! Utsarga/apavada inference.
//!
//! Computes, once per rule table, which rules override which. Rules are first
//! put in declaration order (by [`NameKey`]); then every rule is compared with
//! the rules it could override or be overridden by:
//!
//! ```text
//! Ordinary  rule i : scan rules i+1..   rule.has_apavada(other) -> other overrides rule
//! Residual  rule i : scan rules ..i     rule.has_apavada(other) -> other overrides rule
//! Blocking  rule i : every non-blocking rule with the same operator category
//!                                       -> rule overrides it
//! ```
//!
//! Edges always point one way for a given pair, so the resulting graph has no
//! two rules overriding each other.

use crate::rule::{Rule, RuleKind};
use std::sync::Arc;

/// Declaration-order key parsed from a rule name.
///
/// `"6.4.77"` sorts as `[6, 4, 77]`; ranges like `"1.1.60 - 1.1.63"` sort by
/// their first name. Names that are not dotted numbers sort after all numeric
/// names, alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameKey {
    Numeric(Vec<u32>),
    Other(String),
}

impl NameKey {
    pub fn parse(name: &str) -> NameKey {
        let head = name.split_whitespace().next().unwrap_or("");
        if regex!(r"^\d+(\.\d+)*$").is_match(head) {
            let parts: Option<Vec<u32>> = head.split('.').map(|p| p.parse().ok()).collect();
            if let Some(parts) = parts {
                return NameKey::Numeric(parts);
            }
        }
        NameKey::Other(name.to_string())
    }
}

/// Sort rules into declaration order. Ties keep their input order.
pub(crate) fn sort_rules(rules: &mut [Rule]) {
    rules.sort_by_cached_key(|r| NameKey::parse(r.name()));
}

fn link(utsarga: &mut [Vec<usize>], apavada: &mut [Vec<usize>], general: usize, specific: usize) {
    if !apavada[general].contains(&specific) {
        apavada[general].push(specific);
        utsarga[specific].push(general);
    }
}

/// Fill every rule's `utsarga` and `apavada` lists. Returns the number of edges.
///
/// `rules` must already be in declaration order.
pub(crate) fn infer(rules: &mut [Rule]) -> usize {
    let n = rules.len();
    let mut utsarga: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut apavada: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        let rule = &rules[i];
        match rule.kind() {
            RuleKind::Blocking => {
                for (j, other) in rules.iter().enumerate() {
                    if j != i
                        && other.kind() != RuleKind::Blocking
                        && rule.operator().category() == other.operator().category()
                    {
                        link(&mut utsarga, &mut apavada, j, i);
                    }
                }
            }
            RuleKind::Residual => {
                for j in 0..i {
                    if rules[j].kind() != RuleKind::Blocking && rule.has_apavada(&rules[j]) {
                        link(&mut utsarga, &mut apavada, i, j);
                    }
                }
            }
            RuleKind::Ordinary => {
                for j in i + 1..n {
                    let other = &rules[j];
                    if other.kind() == RuleKind::Ordinary && rule.has_apavada(other) {
                        link(&mut utsarga, &mut apavada, i, j);
                    }
                }
            }
        }
    }

    let names: Vec<Arc<str>> = rules.iter().map(|r| Arc::clone(r.name_arc())).collect();
    let mut edges = 0;
    for (i, rule) in rules.iter_mut().enumerate() {
        rule.utsarga = utsarga[i].iter().map(|&j| Arc::clone(&names[j])).collect();
        rule.apavada = apavada[i].iter().map(|&j| Arc::clone(&names[j])).collect();
        edges += rule.apavada.len();
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::operator::Operator;

    fn rule(name: &str, center: Filter, op: Operator) -> Rule {
        Rule::new(name, vec![], Some(center), vec![], op).unwrap()
    }

    fn names(list: &[Arc<str>]) -> Vec<&str> {
        list.iter().map(|n| &**n).collect()
    }

    #[test]
    fn name_keys_order_numerically() {
        let mut v = vec!["6.4.77", "1.1.60 - 1.1.63", "6.4.8", "zzz", "6.4.100", "abc"];
        v.sort_by_key(|n| NameKey::parse(n));
        assert_eq!(v, vec!["1.1.60 - 1.1.63", "6.4.8", "6.4.77", "6.4.100", "abc", "zzz"]);
    }

    #[test]
    fn later_specific_rule_overrides_earlier_general() {
        let mut rules = vec![
            rule("7.3.86", Filter::tag(["anga"]) & Filter::last("u"), Operator::set_last("b", "O")),
            rule("7.3.84", Filter::tag(["anga"]), Operator::set_last("a", "o")),
        ];
        sort_rules(&mut rules);
        assert_eq!(rules[0].name(), "7.3.84");
        assert_eq!(infer(&mut rules), 1);
        assert_eq!(names(rules[0].apavada()), vec!["7.3.86"]);
        assert_eq!(names(rules[1].utsarga()), vec!["7.3.84"]);
        assert!(rules[1].apavada().is_empty());
    }

    #[test]
    fn earlier_specific_rule_is_not_an_apavada() {
        let mut rules = vec![
            rule("1.1.1", Filter::tag(["anga"]) & Filter::last("u"), Operator::set_last("b", "O")),
            rule("1.1.2", Filter::tag(["anga"]), Operator::set_last("a", "o")),
        ];
        assert_eq!(infer(&mut rules), 0);
    }

    #[test]
    fn residual_rule_yields_to_earlier_conflicts() {
        let mut rules = vec![
            rule("1.1.1", Filter::tag(["anga"]) & Filter::last("u"), Operator::set_last("b", "O")),
            rule("1.1.2", Filter::tag(["anga"]), Operator::set_last("a", "o")).residual(),
        ];
        infer(&mut rules);
        assert_eq!(names(rules[1].apavada()), vec!["1.1.1"]);
        assert_eq!(names(rules[0].utsarga()), vec!["1.1.2"]);
    }

    #[test]
    fn blocking_rule_overrides_every_rule_of_its_category() {
        let mut rules = vec![
            rule("1.1.1", Filter::tag(["anga"]), Operator::set_last("guna", "o")),
            rule("1.1.2", Filter::tag(["x"]), Operator::set_last("other", "e")),
            rule("1.1.3", Filter::tag(["y"]), Operator::set_first("first", "e")),
            rule("1.1.5", Filter::tag(["it"]), Operator::set_last("na", "o")).blocking(),
        ];
        infer(&mut rules);
        assert_eq!(names(rules[3].utsarga()), vec!["1.1.1", "1.1.2"]);
        assert_eq!(names(rules[0].apavada()), vec!["1.1.5"]);
        assert!(rules[2].apavada().is_empty());
        assert!(rules[3].apavada().is_empty());
    }
}
