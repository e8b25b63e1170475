//! Specificity ranks.
//!
//! A filter's rank is derived from the size of its domain: the fewer values a
//! filter admits, the more specific (and stronger) it is. Scores are kept as
//! integers (`SCALE / |domain|`) so ranks are totally ordered and hashable.
//!
//! Three families are scored separately and compared in this order:
//!
//! 1. `upadesha`: raw/value/lakshana identity filters
//! 2. `tag`: designation and augment filters
//! 3. `sound`: first/last/penultimate/contains sound-set filters

use crate::rule::RuleCategory;
use crate::term::Locus;

const SCALE: u32 = 1 << 20;

fn score(domain_len: usize) -> u32 {
    match u32::try_from(domain_len) {
        Ok(0) => 0,
        Ok(n) => SCALE / n,
        Err(_) => 0,
    }
}

/// Rank of a single filter (or of a whole window, once combined with [`Rank::and`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Rank {
    pub upadesha: u32,
    pub tag: u32,
    pub sound: u32,
}

impl Rank {
    pub fn with_upadesha(domain_len: usize) -> Self {
        Rank { upadesha: score(domain_len), ..Rank::default() }
    }

    pub fn with_tag(domain_len: usize) -> Self {
        Rank { tag: score(domain_len), ..Rank::default() }
    }

    pub fn with_sound(domain_len: usize) -> Self {
        Rank { sound: score(domain_len), ..Rank::default() }
    }

    /// Conjunction: every component adds up.
    pub fn and<I: IntoIterator<Item = Rank>>(ranks: I) -> Rank {
        ranks.into_iter().fold(Rank::default(), |acc, r| Rank {
            upadesha: acc.upadesha.saturating_add(r.upadesha),
            tag: acc.tag.saturating_add(r.tag),
            sound: acc.sound.saturating_add(r.sound),
        })
    }

    /// Disjunction: only what every alternative guarantees survives.
    pub fn or<I: IntoIterator<Item = Rank>>(ranks: I) -> Rank {
        ranks
            .into_iter()
            .reduce(|acc, r| Rank {
                upadesha: acc.upadesha.min(r.upadesha),
                tag: acc.tag.min(r.tag),
                sound: acc.sound.min(r.sound),
            })
            .unwrap_or_default()
    }
}

/// Total rank of a rule. Higher ranks are tried first.
///
/// Field order is significant: the derived `Ord` compares `priority` first, then
/// the rule category, then the locus, then filter specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RuleRank {
    pub priority: u16,
    pub category: u8,
    pub locus: u8,
    pub filters: Rank,
}

impl RuleRank {
    pub fn new(priority: u16, category: RuleCategory, locus: Locus, filters: Rank) -> Self {
        let category = match category {
            RuleCategory::Vidhi => 0,
            RuleCategory::Samjna | RuleCategory::Atidesha | RuleCategory::Paribhasha => 1,
        };
        let locus = match locus {
            Locus::Asiddhavat => 0,
            Locus::Value | Locus::Asiddha => 1,
        };
        RuleRank { priority, category, locus, filters }
    }
}
