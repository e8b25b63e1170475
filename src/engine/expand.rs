//! Stub expansion.
//!
//! Turns [`Section`]s of terse [`RuleStub`]s into full [`Rule`]s. Each stub is
//! resolved against its section's [`Inherit`] and against the rule built just
//! before it (across section boundaries):
//!
//! ```text
//! Cond::Base       -> inherited base filter (allow_all past the first entry)
//! Cond::Same       -> previous rule's filter at the same slot position
//! Cond::Extend(f)  -> f & base   (just f if base is allow_all)
//! OpRef::Same      -> previous rule's operator
//! ```
//!
//! "Previous" means the previous rule's window *before* reduction, so a stub
//! can repeat a context slot that the previous rule ended up dropping.
//!
//! ## Reduction
//!
//! After resolution, a left or right slot made only of `allow_all` is dropped,
//! and an insertion operator clears the center slot (the new term goes between
//! the contexts).

use crate::error::BuildError;
use crate::filter::Filter;
use crate::operator::{OpKind, Operator};
use crate::rule::{Rule, RuleCategory};
use crate::stub::{Cond, Inherit, OpRef, RuleStub, Section, StubFlags};
use tracing::trace;

/// Pre-reduction window and operator of the last expanded stub.
struct Previous {
    left: Vec<Filter>,
    center: Vec<Filter>,
    right: Vec<Filter>,
    operator: Operator,
}

/// Which entry of a slot the base filter applies to.
#[derive(Clone, Copy)]
enum BaseAt {
    First,
    Last,
}

fn resolve_slot(
    rule: &str,
    slot: &'static str,
    conds: &[Cond],
    base: &Filter,
    base_at: BaseAt,
    prev: Option<&[Filter]>,
) -> Result<Vec<Filter>, BuildError> {
    let inherit_only = [Cond::Base];
    let conds = if conds.is_empty() { &inherit_only[..] } else { conds };
    let base_index = match base_at {
        BaseAt::First => 0,
        BaseAt::Last => conds.len() - 1,
    };

    conds
        .iter()
        .enumerate()
        .map(|(k, cond)| {
            let base = (k == base_index).then_some(base);
            match cond {
                Cond::Base => Ok(base.cloned().unwrap_or_else(Filter::allow_all)),
                Cond::Same => {
                    let prev =
                        prev.ok_or_else(|| BuildError::NothingToRepeat { rule: rule.to_string(), what: slot })?;
                    prev.get(k)
                        .cloned()
                        .ok_or_else(|| BuildError::MissingPreviousFilter { rule: rule.to_string(), slot, index: k })
                }
                Cond::Extend(f) => Ok(match base {
                    Some(b) if !b.is_allow_all() => f & b,
                    _ => f.clone(),
                }),
            }
        })
        .collect()
}

fn reduce(slot: Vec<Filter>) -> Vec<Filter> {
    if slot.iter().all(Filter::is_allow_all) { Vec::new() } else { slot }
}

fn expand_stub(stub: &RuleStub, inherit: &Inherit, prev: Option<&Previous>) -> Result<(Rule, Previous), BuildError> {
    let name = stub.name.as_str();
    if stub.flags.contains(StubFlags::BLOCKING) && stub.flags.intersects(StubFlags::OPTIONAL | StubFlags::RESIDUAL) {
        return Err(BuildError::ConflictingModifiers(name.to_string()));
    }

    let left =
        resolve_slot(name, "left context", &stub.left, &inherit.left, BaseAt::Last, prev.map(|p| &p.left[..]))?;
    let center = resolve_slot(
        name,
        "center context",
        std::slice::from_ref(&stub.center),
        &inherit.center,
        BaseAt::First,
        prev.map(|p| &p.center[..]),
    )?;
    let right =
        resolve_slot(name, "right context", &stub.right, &inherit.right, BaseAt::First, prev.map(|p| &p.right[..]))?;

    let operator = match &stub.operator {
        OpRef::Op(op) => op.clone(),
        OpRef::Same => prev
            .map(|p| p.operator.clone())
            .ok_or_else(|| BuildError::NothingToRepeat { rule: name.to_string(), what: "operator" })?,
    };

    let center_filter = if operator.is_insert() {
        if matches!(stub.center, Cond::Extend(_)) {
            return Err(BuildError::InsertWithCenter(name.to_string()));
        }
        None
    } else {
        center.first().cloned()
    };

    let category = match (operator.kind(), inherit.category) {
        (OpKind::AddTags(_), _) => RuleCategory::Samjna,
        (_, Some(category)) => category,
        (_, None) => RuleCategory::Vidhi,
    };

    let mut rule = Rule::new(name, reduce(left.clone()), center_filter, reduce(right.clone()), operator.clone())?
        .with_locus(inherit.locus)
        .with_category(category)
        .with_priority(stub.priority);
    if stub.flags.contains(StubFlags::OPTIONAL) {
        rule = rule.optional();
    }
    if stub.flags.contains(StubFlags::BLOCKING) {
        rule = rule.blocking();
    }
    if stub.flags.contains(StubFlags::RESIDUAL) {
        rule = rule.residual();
    }
    trace!(rule = name, window = rule.filters().len(), offset = rule.offset(), "expanded stub");

    Ok((rule, Previous { left, center, right, operator }))
}

/// Expand every stub of every section, in declaration order.
pub(crate) fn expand(sections: &[Section]) -> Result<Vec<Rule>, BuildError> {
    let mut rules = Vec::with_capacity(sections.iter().map(|s| s.stubs.len()).sum());
    let mut prev: Option<Previous> = None;
    for section in sections {
        for stub in &section.stubs {
            let (rule, next) = expand_stub(stub, &section.inherit, prev.as_ref())?;
            rules.push(rule);
            prev = Some(next);
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::RuleStub;
    use crate::term::{Locus, Term};

    fn guna() -> Operator {
        Operator::set_last("guna", "o")
    }

    fn section(stubs: Vec<RuleStub>) -> Section {
        Section::new(Inherit::new(Filter::allow_all(), Filter::tag(["anga"]), Filter::tag(["sarvadhatuka"])), stubs)
    }

    #[test]
    fn base_filters_fill_omitted_slots() {
        let rules = expand(&[section(vec![RuleStub::new("7.3.84", guna())])]).unwrap();
        let r = &rules[0];
        assert_eq!(r.offset(), 0);
        let names: Vec<&str> = r.filters().iter().map(Filter::name).collect();
        assert_eq!(names, vec!["tag(anga)", "tag(sarvadhatuka)"]);
    }

    #[test]
    fn extend_ands_with_base_and_same_repeats_previous() {
        let rules = expand(&[section(vec![
            crate::stub! { name: "7.3.86", center: Filter::penultimate("iu"), op: guna() },
            crate::stub! { name: "7.3.87", center: Cond::Same, op: OpRef::Same, flags: StubFlags::OPTIONAL },
        ])])
        .unwrap();
        assert_eq!(rules[0].filters()[0].name(), "and(penultimate(iu), tag(anga))");
        assert_eq!(rules[1].filters()[0], rules[0].filters()[0]);
        assert_eq!(rules[1].operator().name(), "guna");
        assert!(rules[1].is_optional());
    }

    #[test]
    fn repeating_without_a_previous_rule_fails() {
        let err = expand(&[section(vec![RuleStub::new("1.1.1", OpRef::Same)])]).unwrap_err();
        assert_eq!(err, BuildError::NothingToRepeat { rule: "1.1.1".into(), what: "operator" });

        let err = expand(&[section(vec![
            RuleStub::new("1.1.1", guna()),
            crate::stub! { name: "1.1.2", right: [Filter::tag(["a"]), Cond::Same], op: guna() },
        ])])
        .unwrap_err();
        assert_eq!(err, BuildError::MissingPreviousFilter { rule: "1.1.2".into(), slot: "right context", index: 1 });
    }

    #[test]
    fn insertion_clears_center_and_allow_all_slots_drop() {
        let inherit = Inherit::new(Filter::allow_all(), Filter::allow_all(), Filter::allow_all());
        let rules = expand(&[Section::new(
            inherit.clone(),
            vec![crate::stub! {
                name: "7.2.35",
                left: [Filter::tag(["dhatu"])],
                op: Operator::insert("iw", Term::new("i")),
            }],
        )])
        .unwrap();
        assert_eq!(rules[0].filters().len(), 1);
        assert_eq!(rules[0].offset(), 1);

        let err = expand(&[Section::new(
            inherit,
            vec![crate::stub! { name: "x", center: Filter::tag(["a"]), op: Operator::insert("iw", Term::new("i")) }],
        )])
        .unwrap_err();
        assert_eq!(err, BuildError::InsertWithCenter("x".into()));
    }

    #[test]
    fn sections_supply_locus_and_category() {
        let inherit = Inherit::new(Filter::allow_all(), Filter::tag(["anga"]), Filter::allow_all())
            .with_locus(Locus::Asiddhavat)
            .with_category(RuleCategory::Paribhasha);
        let rules = expand(&[Section::new(
            inherit,
            vec![RuleStub::new("6.4.1", guna()), RuleStub::new("6.4.2", Operator::add_tags("t", "t", ["t"]))],
        )])
        .unwrap();
        assert_eq!(rules[0].locus(), Locus::Asiddhavat);
        assert_eq!(rules[0].category(), RuleCategory::Paribhasha);
        assert_eq!(rules[1].category(), RuleCategory::Samjna);
    }

    #[test]
    fn blocking_with_optional_is_rejected() {
        let stub = crate::stub! { name: "1.1.4", op: guna(), flags: StubFlags::BLOCKING | StubFlags::OPTIONAL };
        assert_eq!(expand(&[section(vec![stub])]).unwrap_err(), BuildError::ConflictingModifiers("1.1.4".into()));
    }
}
