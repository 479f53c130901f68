//! Filter trait and chain composition.
//!
//! Concrete filter kinds (name patterns, path prefixes, regexes, attributes,
//! temporal and blob-type filters) live in the transform crate; the chain
//! semantics live here so traversers can evaluate a chain without depending
//! on the filter implementations.
//!
//! Composition rule: include filters are ORed within a kind and ANDed across
//! kinds; exclude filters are ORed, and the object is dropped if any exclude
//! matches. Exclude wins over include. Cheap filters run before expensive
//! ones.

use std::sync::Arc;

use crate::error::Side;
use crate::object::StoredObject;

/// Which side(s) of a transfer a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    Source,
    Destination,
    Both,
}

impl FilterScope {
    pub fn covers(&self, side: Side) -> bool {
        match self {
            FilterScope::Both => true,
            FilterScope::Source => side == Side::Source,
            FilterScope::Destination => side == Side::Destination,
        }
    }
}

/// Evaluation cost class. Cheap predicates are pure lookups on already-held
/// object fields; expensive ones may have needed a property fetch upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScanCost {
    Cheap,
    Expensive,
}

/// Filter kind, used for the AND-across-kinds composition rule. Two filters
/// of the same kind with include polarity are alternatives; filters of
/// different kinds are both required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    NamePattern,
    PathPrefix,
    PathRegex,
    Attribute,
    Before,
    After,
    BlobType,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Include,
    Exclude,
}

/// A pure predicate over a [`StoredObject`]. Filters never perform I/O and
/// never produce errors.
pub trait ObjectFilter: Send + Sync {
    fn kind(&self) -> FilterKind;

    fn polarity(&self) -> Polarity;

    fn applies_to(&self) -> FilterScope {
        FilterScope::Both
    }

    fn cost(&self) -> ScanCost {
        ScanCost::Cheap
    }

    /// Whether the predicate matches the object. The chain applies polarity:
    /// a matching include admits, a matching exclude drops.
    fn matches(&self, object: &StoredObject) -> bool;
}

/// An ordered set of filters with the composition semantics above.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ObjectFilter>>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|flt| (flt.kind(), flt.polarity())))
            .finish()
    }
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn ObjectFilter>) {
        self.filters.push(filter);
        // Keep evaluation order cheap-first; stable so same-cost filters
        // retain insertion order and evaluation stays deterministic.
        self.filters.sort_by_key(|f| f.cost());
    }

    pub fn with(mut self, filter: Arc<dyn ObjectFilter>) -> Self {
        self.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// The subset of this chain that applies to the given transfer side.
    pub fn scoped(&self, side: Side) -> FilterChain {
        FilterChain {
            filters: self
                .filters
                .iter()
                .filter(|f| f.applies_to().covers(side))
                .cloned()
                .collect(),
        }
    }

    /// Whether the chain admits the object.
    pub fn admits(&self, object: &StoredObject) -> bool {
        // Excludes first: any match drops, and exclude wins over include.
        for filter in &self.filters {
            if filter.polarity() == Polarity::Exclude && filter.matches(object) {
                return false;
            }
        }

        // Includes: ANDed across kinds, ORed within a kind.
        let mut required_kinds: Vec<FilterKind> = Vec::new();
        for filter in &self.filters {
            if filter.polarity() == Polarity::Include && !required_kinds.contains(&filter.kind()) {
                required_kinds.push(filter.kind());
            }
        }
        for kind in required_kinds {
            let any_match = self
                .filters
                .iter()
                .filter(|f| f.polarity() == Polarity::Include && f.kind() == kind)
                .any(|f| f.matches(object));
            if !any_match {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::RelativePath;

    struct NameIs {
        name: &'static str,
        polarity: Polarity,
        cost: ScanCost,
    }

    impl ObjectFilter for NameIs {
        fn kind(&self) -> FilterKind {
            FilterKind::NamePattern
        }
        fn polarity(&self) -> Polarity {
            self.polarity
        }
        fn cost(&self) -> ScanCost {
            self.cost
        }
        fn matches(&self, object: &StoredObject) -> bool {
            object.name == self.name
        }
    }

    struct UnderDir(&'static str);

    impl ObjectFilter for UnderDir {
        fn kind(&self) -> FilterKind {
            FilterKind::PathPrefix
        }
        fn polarity(&self) -> Polarity {
            Polarity::Include
        }
        fn matches(&self, object: &StoredObject) -> bool {
            object
                .relative_path
                .starts_with_dir(&RelativePath::parse(self.0).unwrap())
        }
    }

    fn obj(path: &str) -> StoredObject {
        StoredObject::file(RelativePath::parse(path).unwrap(), 1, None)
    }

    #[test]
    fn empty_chain_admits_everything() {
        assert!(FilterChain::new().admits(&obj("any/file")));
    }

    #[test]
    fn includes_or_within_kind() {
        let chain = FilterChain::new()
            .with(Arc::new(NameIs {
                name: "a.txt",
                polarity: Polarity::Include,
                cost: ScanCost::Cheap,
            }))
            .with(Arc::new(NameIs {
                name: "b.txt",
                polarity: Polarity::Include,
                cost: ScanCost::Cheap,
            }));
        assert!(chain.admits(&obj("a.txt")));
        assert!(chain.admits(&obj("b.txt")));
        assert!(!chain.admits(&obj("c.txt")));
    }

    #[test]
    fn includes_and_across_kinds() {
        let chain = FilterChain::new()
            .with(Arc::new(NameIs {
                name: "a.txt",
                polarity: Polarity::Include,
                cost: ScanCost::Cheap,
            }))
            .with(Arc::new(UnderDir("docs")));
        assert!(chain.admits(&obj("docs/a.txt")));
        assert!(!chain.admits(&obj("a.txt")));
        assert!(!chain.admits(&obj("docs/b.txt")));
    }

    #[test]
    fn exclude_wins_over_include() {
        let chain = FilterChain::new()
            .with(Arc::new(NameIs {
                name: "a.txt",
                polarity: Polarity::Include,
                cost: ScanCost::Cheap,
            }))
            .with(Arc::new(NameIs {
                name: "a.txt",
                polarity: Polarity::Exclude,
                cost: ScanCost::Cheap,
            }));
        assert!(!chain.admits(&obj("a.txt")));
    }

    #[test]
    fn adding_an_include_never_grows_the_accepted_set() {
        let base = FilterChain::new().with(Arc::new(UnderDir("docs")));
        let tighter = base.clone().with(Arc::new(NameIs {
            name: "a.txt",
            polarity: Polarity::Include,
            cost: ScanCost::Cheap,
        }));
        for path in ["docs/a.txt", "docs/b.txt", "other/a.txt"] {
            let o = obj(path);
            if tighter.admits(&o) {
                assert!(base.admits(&o));
            }
        }
    }

    #[test]
    fn adding_an_exclude_never_shrinks_the_rejected_set() {
        let base = FilterChain::new().with(Arc::new(NameIs {
            name: "a.txt",
            polarity: Polarity::Exclude,
            cost: ScanCost::Cheap,
        }));
        let tighter = base.clone().with(Arc::new(NameIs {
            name: "b.txt",
            polarity: Polarity::Exclude,
            cost: ScanCost::Expensive,
        }));
        for path in ["a.txt", "b.txt", "c.txt"] {
            let o = obj(path);
            if !base.admits(&o) {
                assert!(!tighter.admits(&o));
            }
        }
    }
}
