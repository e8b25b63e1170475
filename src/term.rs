//! Terms: the immutable units a derivation rewrites.
//!
//! A [`Term`] is a cheap, shareable handle (`Arc`) around its data. Every
//! transformation returns a *new* term; the old one is never touched, which is
//! what makes the per-term filter cache sound: a cached answer can only go stale
//! if the term changes, and terms never change.
//!
//! ## Data spaces
//!
//! A term carries five fixed, ordered spaces:
//!
//! ```text
//! raw ─▶ clean ─▶ value ─▶ asiddhavat ─▶ asiddha
//! ```
//!
//! Writing a space overwrites every space to its right as well. Rules whose locus
//! is [`Locus::Asiddhavat`] therefore write `asiddhavat` + `asiddha` but leave
//! `value` alone, so filters reading `value` (the default) do not see their
//! effects. The rendered surface form is read from `asiddha`.

use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// Effect namespace a rule writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Locus {
    #[default]
    Value,
    Asiddhavat,
    Asiddha,
}

/// One of the five data spaces of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Space {
    Raw,
    Clean,
    Value,
    Asiddhavat,
    Asiddha,
}

impl From<Locus> for Space {
    fn from(locus: Locus) -> Self {
        match locus {
            Locus::Value => Space::Value,
            Locus::Asiddhavat => Space::Asiddhavat,
            Locus::Asiddha => Space::Asiddha,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DataSpace {
    raw: String,
    clean: String,
    value: String,
    asiddhavat: String,
    asiddha: String,
}

impl DataSpace {
    fn get(&self, space: Space) -> &str {
        match space {
            Space::Raw => &self.raw,
            Space::Clean => &self.clean,
            Space::Value => &self.value,
            Space::Asiddhavat => &self.asiddhavat,
            Space::Asiddha => &self.asiddha,
        }
    }

    /// Write `space` and cascade the new value into every later space.
    fn write(&self, space: Space, new: &str) -> DataSpace {
        let mut out = self.clone();
        let slots: [(Space, &mut String); 5] = [
            (Space::Raw, &mut out.raw),
            (Space::Clean, &mut out.clean),
            (Space::Value, &mut out.value),
            (Space::Asiddhavat, &mut out.asiddhavat),
            (Space::Asiddha, &mut out.asiddha),
        ];
        for (slot, field) in slots {
            if slot >= space {
                field.clear();
                field.push_str(new);
            }
        }
        out
    }
}

/// Upper bound on cached filter results per term.
///
/// Every edit forks a fresh, empty cache, and `select` walks start at the top of
/// the rule tree each time, so the first names cached are the ones asked for
/// most often. Once full, the cache keeps what it has and later filters are
/// evaluated directly.
const FILTER_CACHE_CAPACITY: usize = 64;

/// Slots held inline before spilling to the heap.
const FILTER_CACHE_INLINE: usize = 8;

/// Small bounded map from filter name to its result on this term.
///
/// A poisoned lock just disables caching for that term; the filter is
/// evaluated directly.
#[derive(Default)]
struct FilterCache {
    slots: Mutex<SmallVec<[(Arc<str>, bool); FILTER_CACHE_INLINE]>>,
}

impl FilterCache {
    fn lookup(&self, name: &Arc<str>) -> Option<bool> {
        let slots = self.slots.lock().ok()?;
        slots.iter().find(|(key, _)| Arc::ptr_eq(key, name) || **key == **name).map(|(_, hit)| *hit)
    }

    fn store(&self, name: &Arc<str>, result: bool) {
        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        if slots.len() < FILTER_CACHE_CAPACITY {
            slots.push((Arc::clone(name), result));
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}

struct TermData {
    data: DataSpace,
    tags: BTreeSet<String>,
    lakshana: BTreeSet<String>,
    ops: BTreeSet<Arc<str>>,
    parts: Vec<String>,
    cache: FilterCache,
}

impl TermData {
    /// Copy every field except the cache, which starts empty.
    fn fork(&self) -> TermData {
        TermData {
            data: self.data.clone(),
            tags: self.tags.clone(),
            lakshana: self.lakshana.clone(),
            ops: self.ops.clone(),
            parts: self.parts.clone(),
            cache: FilterCache::default(),
        }
    }
}

/// One morphological unit (root, suffix, augment ...).
///
/// Equality and hashing are structural and ignore the filter cache.
#[derive(Clone)]
pub struct Term(Arc<TermData>);

impl Term {
    /// Create a term whose every space holds `raw`.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self::with_clean(raw.clone(), raw)
    }

    /// Create a term with a distinct cleaned form (raw minus markers).
    pub fn with_clean(raw: impl Into<String>, clean: impl Into<String>) -> Self {
        let raw = raw.into();
        let clean = clean.into();
        let data = DataSpace {
            raw,
            value: clean.clone(),
            asiddhavat: clean.clone(),
            asiddha: clean.clone(),
            clean,
        };
        Term(Arc::new(TermData {
            data,
            tags: BTreeSet::new(),
            lakshana: BTreeSet::new(),
            ops: BTreeSet::new(),
            parts: Vec::new(),
            cache: FilterCache::default(),
        }))
    }

    fn edit(&self, f: impl FnOnce(&mut TermData)) -> Term {
        let mut data = self.0.fork();
        f(&mut data);
        Term(Arc::new(data))
    }

    // --- Spaces ---------------------------------------------------------------

    pub fn get(&self, space: Space) -> &str {
        self.0.data.get(space)
    }

    pub fn raw(&self) -> &str {
        &self.0.data.raw
    }

    pub fn clean(&self) -> &str {
        &self.0.data.clean
    }

    /// The value created by ordinary (non-isolated) rules. Filters read this.
    pub fn value(&self) -> &str {
        &self.0.data.value
    }

    pub fn asiddhavat(&self) -> &str {
        &self.0.data.asiddhavat
    }

    pub fn asiddha(&self) -> &str {
        &self.0.data.asiddha
    }

    /// The surface text of this term (the last space).
    pub fn text(&self) -> &str {
        self.asiddha()
    }

    pub fn first(&self, space: Space) -> Option<char> {
        self.get(space).chars().next()
    }

    pub fn last(&self, space: Space) -> Option<char> {
        self.get(space).chars().next_back()
    }

    pub fn penultimate(&self, space: Space) -> Option<char> {
        self.get(space).chars().rev().nth(1)
    }

    // --- Markers ----------------------------------------------------------------

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.0.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.0.tags.contains(tag)
    }

    pub fn any_tag(&self, tags: &[&str]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    pub fn lakshana(&self) -> &BTreeSet<String> {
        &self.0.lakshana
    }

    pub fn ops(&self) -> &BTreeSet<Arc<str>> {
        &self.0.ops
    }

    /// Whether a rule with this name was applied (or declined/blocked) on this term.
    pub fn has_applied(&self, rule: &str) -> bool {
        self.0.ops.contains(rule)
    }

    pub fn parts(&self) -> &[String] {
        &self.0.parts
    }

    // --- Transformations --------------------------------------------------------

    /// Write `new` into the space for `locus` (cascading to later spaces).
    pub fn set_at(&self, locus: Locus, new: &str) -> Term {
        let data = self.0.data.write(locus.into(), new);
        self.edit(|t| t.data = data)
    }

    /// Replace the raw value; every space is rewritten and the old raw value
    /// is kept as a lakshana.
    pub fn set_raw(&self, raw: &str) -> Term {
        let data = self.0.data.write(Space::Raw, raw);
        let old = self.raw().to_string();
        self.edit(|t| {
            t.data = data;
            t.lakshana.insert(old);
        })
    }

    pub fn add_tags<I, S>(&self, tags: I) -> Term
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edit(|t| t.tags.extend(tags.into_iter().map(Into::into)))
    }

    pub fn remove_tags<I, S>(&self, tags: I) -> Term
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.edit(|t| {
            for tag in tags {
                t.tags.remove(tag.as_ref());
            }
        })
    }

    pub fn add_lakshana(&self, name: impl Into<String>) -> Term {
        let name = name.into();
        self.edit(|t| {
            t.lakshana.insert(name);
        })
    }

    pub fn add_ops<'a, I>(&self, rules: I) -> Term
    where
        I: IntoIterator<Item = &'a Arc<str>>,
    {
        self.edit(|t| t.ops.extend(rules.into_iter().cloned()))
    }

    pub fn add_part(&self, part: impl Into<String>) -> Term {
        let part = part.into();
        self.edit(|t| t.parts.push(part))
    }

    // --- Filter cache -----------------------------------------------------------

    /// Evaluate a term-level filter through this term's cache.
    pub(crate) fn cached(&self, name: &Arc<str>, eval: impl FnOnce(&Term) -> bool) -> bool {
        if let Some(hit) = self.0.cache.lookup(name) {
            return hit;
        }
        let result = eval(self);
        self.0.cache.store(name, result);
        result
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.data == b.data && a.tags == b.tags && a.lakshana == b.lakshana && a.ops == b.ops && a.parts == b.parts
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let t = &*self.0;
        t.data.hash(state);
        t.tags.hash(state);
        t.lakshana.hash(state);
        t.ops.hash(state);
        t.parts.hash(state);
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Term")
            .field("raw", &self.raw())
            .field("value", &self.value())
            .field("asiddha", &self.asiddha())
            .field("tags", &self.0.tags)
            .field("lakshana", &self.0.lakshana)
            .field("ops", &self.0.ops)
            .field("parts", &self.0.parts)
            .finish()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
