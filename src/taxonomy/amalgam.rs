//! Composite taxonomy views.
//!
//! An amalgam unions direct-relation queries across several sources. A
//! forward source is consulted as-is; an inverse source is consulted with
//! the parent and child roles swapped, which lets a "has-part"-style
//! assemblage contribute edges in the opposite direction without rebuilding
//! it.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::Nid;

use super::snapshot::TaxonomySnapshot;
use super::{TaxonomyError, TaxonomyLink};

/// N forward sources plus M inverse sources, with an optional defining
/// source for transitive queries.
///
/// Direct queries (children, parents, links, leaf) union every source.
/// Transitive queries (`is_kind_of`, `kind_of_set`) are only answerable by
/// the defining source, typically the description-logic-derived taxonomy;
/// without one they fail with [`TaxonomyError::UnsupportedComposition`] and
/// callers must branch on that.
#[derive(Clone, Default)]
pub struct TaxonomyAmalgam {
    forward: Vec<Arc<dyn TaxonomySnapshot>>,
    inverse: Vec<Arc<dyn TaxonomySnapshot>>,
    defining: Option<Arc<dyn TaxonomySnapshot>>,
}

impl TaxonomyAmalgam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forward(mut self, source: Arc<dyn TaxonomySnapshot>) -> Self {
        self.forward.push(source);
        self
    }

    pub fn with_inverse(mut self, source: Arc<dyn TaxonomySnapshot>) -> Self {
        self.inverse.push(source);
        self
    }

    /// The defining source also participates as a forward source.
    pub fn with_defining(mut self, source: Arc<dyn TaxonomySnapshot>) -> Self {
        self.forward.push(Arc::clone(&source));
        self.defining = Some(source);
        self
    }

    pub fn has_defining_source(&self) -> bool {
        self.defining.is_some()
    }

    fn defining(&self) -> Result<&Arc<dyn TaxonomySnapshot>, TaxonomyError> {
        self.defining
            .as_ref()
            .ok_or(TaxonomyError::UnsupportedComposition)
    }
}

impl TaxonomySnapshot for TaxonomyAmalgam {
    fn children_of(&self, nid: Nid) -> Vec<Nid> {
        let mut set = BTreeSet::new();
        for source in &self.forward {
            set.extend(source.children_of(nid));
        }
        for source in &self.inverse {
            set.extend(source.parents_of(nid));
        }
        set.into_iter().collect()
    }

    fn parents_of(&self, nid: Nid) -> Vec<Nid> {
        let mut set = BTreeSet::new();
        for source in &self.forward {
            set.extend(source.parents_of(nid));
        }
        for source in &self.inverse {
            set.extend(source.children_of(nid));
        }
        set.into_iter().collect()
    }

    fn child_links_of(&self, nid: Nid) -> Vec<TaxonomyLink> {
        let mut set = BTreeSet::new();
        for source in &self.forward {
            set.extend(source.child_links_of(nid));
        }
        for source in &self.inverse {
            set.extend(source.parent_links_of(nid));
        }
        set.into_iter().collect()
    }

    fn parent_links_of(&self, nid: Nid) -> Vec<TaxonomyLink> {
        let mut set = BTreeSet::new();
        for source in &self.forward {
            set.extend(source.parent_links_of(nid));
        }
        for source in &self.inverse {
            set.extend(source.child_links_of(nid));
        }
        set.into_iter().collect()
    }

    fn roots(&self) -> Vec<Nid> {
        let mut set = BTreeSet::new();
        for source in &self.forward {
            set.extend(source.roots());
        }
        set.into_iter().collect()
    }

    /// Leaf only if every constituent source reports leaf in its role.
    fn is_leaf(&self, nid: Nid) -> bool {
        self.forward.iter().all(|source| source.is_leaf(nid))
            && self
                .inverse
                .iter()
                .all(|source| source.parents_of(nid).is_empty())
    }

    fn is_kind_of(&self, child: Nid, parent: Nid) -> Result<bool, TaxonomyError> {
        self.defining()?.is_kind_of(child, parent)
    }

    fn kind_of_set(&self, nid: Nid) -> Result<BTreeSet<Nid>, TaxonomyError> {
        self.defining()?.kind_of_set(nid)
    }
}

#[cfg(test)]
mod tests {
    use crate::taxonomy::tree::Tree;

    use super::*;

    const ISA: Nid = Nid(-10);
    const PART_OF: Nid = Nid(-11);

    struct FixedSnapshot {
        tree: Tree,
    }

    impl FixedSnapshot {
        fn new(edges: &[(i32, i32)], type_nid: Nid) -> Arc<dyn TaxonomySnapshot> {
            let mut tree = Tree::new();
            for (child, parent) in edges {
                tree.add_edge(Nid(*child), Nid(*parent), type_nid);
            }
            Arc::new(Self { tree })
        }
    }

    impl TaxonomySnapshot for FixedSnapshot {
        fn children_of(&self, nid: Nid) -> Vec<Nid> {
            self.tree.children_of(nid)
        }

        fn parents_of(&self, nid: Nid) -> Vec<Nid> {
            self.tree.parents_of(nid)
        }

        fn child_links_of(&self, nid: Nid) -> Vec<TaxonomyLink> {
            self.tree.child_links_of(nid)
        }

        fn parent_links_of(&self, nid: Nid) -> Vec<TaxonomyLink> {
            self.tree.parent_links_of(nid)
        }

        fn roots(&self) -> Vec<Nid> {
            self.tree.roots()
        }

        fn is_kind_of(&self, child: Nid, parent: Nid) -> Result<bool, TaxonomyError> {
            Ok(self.tree.ancestor_nid_set(child).contains(&parent))
        }

        fn kind_of_set(&self, nid: Nid) -> Result<BTreeSet<Nid>, TaxonomyError> {
            Ok(self.tree.ancestor_nid_set(nid))
        }
    }

    #[test]
    fn parent_query_unions_disjoint_sources_without_duplicates() {
        let first = FixedSnapshot::new(&[(10, 1), (10, 2)], ISA);
        let second = FixedSnapshot::new(&[(10, 2), (10, 3)], ISA);
        let amalgam = TaxonomyAmalgam::new()
            .with_forward(first)
            .with_forward(second);

        assert_eq!(amalgam.parents_of(Nid(10)), vec![Nid(1), Nid(2), Nid(3)]);
    }

    #[test]
    fn inverse_source_swaps_roles() {
        // In the inverse source, 5 is a parent of 10; through the amalgam
        // that edge reads as 5 being a child of 10.
        let inverse = FixedSnapshot::new(&[(10, 5)], PART_OF);
        let amalgam = TaxonomyAmalgam::new().with_inverse(inverse);

        assert_eq!(amalgam.children_of(Nid(10)), vec![Nid(5)]);
        assert_eq!(amalgam.parents_of(Nid(5)), vec![Nid(10)]);
    }

    #[test]
    fn leaf_requires_every_source_to_agree() {
        let first = FixedSnapshot::new(&[(10, 1)], ISA);
        let second = FixedSnapshot::new(&[(11, 10)], ISA);
        let amalgam = TaxonomyAmalgam::new()
            .with_forward(first)
            .with_forward(second);

        assert!(!amalgam.is_leaf(Nid(10)));
        assert!(amalgam.is_leaf(Nid(11)));
    }

    #[test]
    fn transitive_queries_require_a_defining_source() {
        let source = FixedSnapshot::new(&[(10, 1)], ISA);
        let without = TaxonomyAmalgam::new().with_forward(Arc::clone(&source));
        assert!(matches!(
            without.is_kind_of(Nid(10), Nid(1)),
            Err(TaxonomyError::UnsupportedComposition)
        ));
        assert!(matches!(
            without.kind_of_set(Nid(10)),
            Err(TaxonomyError::UnsupportedComposition)
        ));

        let with = TaxonomyAmalgam::new().with_defining(source);
        assert!(with.is_kind_of(Nid(10), Nid(1)).unwrap());
        assert_eq!(
            with.kind_of_set(Nid(10)).unwrap(),
            BTreeSet::from([Nid(1), Nid(10)])
        );
    }
}
