//! # Nonterminal Name Interning
//!
//! Nonterminal names are interned once and referenced by a small copyable
//! key for the rest of a build. This keeps the transformation passes cheap
//! (key comparison instead of string comparison) while names stay available
//! for diagnostics and for the generated id header.
//!
//! The table also owns the fresh-name factory used by the grammar
//! transformer: `fresh("E")` yields `E1`, `E2`, … per base name, skipping
//! any identifier that already exists in this build.

use hashbrown::HashMap;
use lasso::{Rodeo, Spur};
use std::fmt;

/// An interned nonterminal name.
///
/// Cheap to copy and compare; resolve it back to a `&str` with
/// [`NameTable::resolve`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Spur);

impl Name {
    pub(crate) const fn from_spur(spur: Spur) -> Self {
        Self(spur)
    }

    /// Stable ordering key for this name within one build.
    #[must_use]
    pub fn index(self) -> usize {
        lasso::Key::into_usize(self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.index())
    }
}

/// Interner for nonterminal names plus the sub-nonterminal factory.
pub struct NameTable {
    rodeo: Rodeo,
    fresh_counters: HashMap<Name, usize>,
}

impl NameTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rodeo: Rodeo::new(),
            fresh_counters: HashMap::new(),
        }
    }

    /// Intern a name, returning the existing key if it was seen before.
    pub fn intern(&mut self, name: &str) -> Name {
        Name(self.rodeo.get_or_intern(name))
    }

    /// Look up a name without interning it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Name> {
        self.rodeo.get(name).map(Name)
    }

    /// Resolve a key back to its text.
    #[must_use]
    pub fn resolve(&self, name: Name) -> &str {
        self.rodeo.resolve(&name.0)
    }

    /// Create a fresh sub-nonterminal derived from `base`.
    ///
    /// Follows the reference policy: the k-th derived sibling of `E` is
    /// named `Ek`. A candidate colliding with any name already interned in
    /// this build is skipped, so the result is distinct from every
    /// nonterminal ever seen here.
    pub fn fresh(&mut self, base: Name) -> Name {
        loop {
            let counter = self.fresh_counters.entry(base).or_insert(0);
            *counter += 1;
            let candidate = format!("{}{}", self.rodeo.resolve(&base.0), *counter);
            if self.rodeo.get(&candidate).is_none() {
                return Name(self.rodeo.get_or_intern(&candidate));
            }
        }
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let mut names = NameTable::new();
        let a = names.intern("Expr");
        let b = names.intern("Expr");
        let c = names.intern("Term");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(names.resolve(a), "Expr");
    }

    #[test]
    fn test_fresh_names_are_numbered_per_base() {
        let mut names = NameTable::new();
        let e = names.intern("E");
        let t = names.intern("T");
        let e1 = names.fresh(e);
        let e2 = names.fresh(e);
        let t1 = names.fresh(t);
        assert_eq!(names.resolve(e1), "E1");
        assert_eq!(names.resolve(e2), "E2");
        assert_eq!(names.resolve(t1), "T1");
    }

    #[test]
    fn test_fresh_skips_existing_names() {
        let mut names = NameTable::new();
        let e = names.intern("E");
        names.intern("E1");
        let fresh = names.fresh(e);
        assert_eq!(names.resolve(fresh), "E2");
    }
}
