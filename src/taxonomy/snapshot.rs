//! Coordinate-fixed taxonomy views over chronicle data.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::core::{
    ChronologyStore, LatestVersion, ManifoldCoordinate, Nid, StampService, VersionPayload,
};

use super::tree::Tree;
use super::{TaxonomyError, TaxonomyLink};

/// Read contract shared by every taxonomy view.
///
/// Lookups on unknown nodes return empty results; only transitive-closure
/// queries can fail, and only over compositions that cannot answer them.
pub trait TaxonomySnapshot: Send + Sync {
    fn children_of(&self, nid: Nid) -> Vec<Nid>;
    fn parents_of(&self, nid: Nid) -> Vec<Nid>;
    fn child_links_of(&self, nid: Nid) -> Vec<TaxonomyLink>;
    fn parent_links_of(&self, nid: Nid) -> Vec<TaxonomyLink>;
    fn roots(&self) -> Vec<Nid>;

    /// Direct child relation.
    fn is_child_of(&self, child: Nid, parent: Nid) -> bool {
        self.parents_of(child).contains(&parent)
    }

    /// Proper transitive child relation, cycle-safe.
    fn is_descendant_of(&self, descendant: Nid, ancestor: Nid) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = self.parents_of(descendant);
        while let Some(node) = stack.pop() {
            if node == ancestor {
                return true;
            }
            if visited.insert(node) {
                stack.extend(self.parents_of(node));
            }
        }
        false
    }

    fn is_leaf(&self, nid: Nid) -> bool {
        self.children_of(nid).is_empty()
    }

    /// Inclusive transitive is-a relation.
    fn is_kind_of(&self, child: Nid, parent: Nid) -> Result<bool, TaxonomyError>;

    /// Inclusive ancestor set.
    fn kind_of_set(&self, nid: Nid) -> Result<BTreeSet<Nid>, TaxonomyError>;
}

/// Taxonomy computed from the is-a assemblage of a chronology store, as seen
/// through one manifold coordinate.
///
/// Contradicted semantics are logged and skipped: a contradiction is a data
/// state for the editing workflow to resolve, not grounds to fail the whole
/// snapshot.
#[derive(Clone, Debug)]
pub struct GraphTaxonomySnapshot {
    tree: Tree,
    coordinate: ManifoldCoordinate,
    isa_assemblage: Nid,
}

impl GraphTaxonomySnapshot {
    pub fn build(
        store: &ChronologyStore,
        stamps: &StampService,
        coordinate: ManifoldCoordinate,
        isa_assemblage: Nid,
    ) -> Self {
        let mut tree = Tree::new();
        for nid in store.semantics_in_assemblage(isa_assemblage) {
            let Some(chronology) = store.get(nid) else {
                continue;
            };
            let Some(component) = chronology.referenced_component() else {
                tracing::warn!(
                    nid = nid.value(),
                    "is-a semantic with no referenced component skipped"
                );
                continue;
            };
            match chronology.latest_version(&coordinate.stamp, stamps) {
                LatestVersion::Absent => {}
                LatestVersion::Contradiction(versions) => {
                    tracing::warn!(
                        nid = nid.value(),
                        contenders = versions.len(),
                        "contradicted is-a semantic skipped"
                    );
                }
                LatestVersion::One(version) => match version.payload() {
                    VersionPayload::LogicGraph(expression) => {
                        for parent in expression.isa_target_nids() {
                            tree.add_edge(component, parent, isa_assemblage);
                        }
                    }
                    VersionPayload::ComponentRef { component: parent } => {
                        tree.add_edge(component, *parent, isa_assemblage);
                    }
                    _ => {}
                },
            }
        }
        Self {
            tree,
            coordinate,
            isa_assemblage,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn coordinate(&self) -> &ManifoldCoordinate {
        &self.coordinate
    }

    pub fn isa_assemblage(&self) -> Nid {
        self.isa_assemblage
    }
}

impl TaxonomySnapshot for GraphTaxonomySnapshot {
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

/// The path hierarchy itself viewed as a taxonomy: each path is a child of
/// its registered origins.
#[derive(Clone, Debug)]
pub struct PathOriginSnapshot {
    tree: Tree,
}

impl PathOriginSnapshot {
    /// `origin_assemblage` types the links, the same way is-a links carry
    /// their source assemblage.
    pub fn build(stamps: &StampService, origin_assemblage: Nid) -> Self {
        let mut tree = Tree::new();
        for (path, origins) in stamps.paths_with_origins() {
            tree.add_node(path);
            for origin in origins {
                tree.add_edge(path, origin.origin, origin_assemblage);
            }
        }
        Self { tree }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }
}

impl TaxonomySnapshot for PathOriginSnapshot {
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

/// Snapshot cache keyed by (coordinate, is-a assemblage).
///
/// Owned by whoever serves snapshots; `invalidate()` must be called on store
/// reset or commit. Eviction is insertion-ordered once capacity is reached.
pub struct SnapshotCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<(ManifoldCoordinate, Nid), Arc<GraphTaxonomySnapshot>>,
    order: VecDeque<(ManifoldCoordinate, Nid)>,
}

impl SnapshotCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get_or_build(
        &self,
        store: &ChronologyStore,
        stamps: &StampService,
        coordinate: &ManifoldCoordinate,
        isa_assemblage: Nid,
    ) -> Arc<GraphTaxonomySnapshot> {
        let key = (coordinate.clone(), isa_assemblage);
        {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(snapshot) = inner.entries.get(&key) {
                return Arc::clone(snapshot);
            }
        }

        // Built outside the lock; a racing builder for the same key just
        // produces an equivalent snapshot and the first insert wins.
        let built = Arc::new(GraphTaxonomySnapshot::build(
            store,
            stamps,
            coordinate.clone(),
            isa_assemblage,
        ));
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = inner.entries.get(&key) {
            return Arc::clone(existing);
        }
        while inner.entries.len() >= self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            } else {
                break;
            }
        }
        inner.entries.insert(key.clone(), Arc::clone(&built));
        inner.order.push_back(key);
        built
    }

    /// Drop every cached snapshot. Call on store reset or after commits.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::core::{
        Chronology, ComponentId, Stamp, StampCoordinate, Status, Version, VersionTime,
    };
    use crate::logic::{ConceptRef, ExpressionBuilder};

    use super::*;

    const ISA: Nid = Nid(-10);
    const AUTHOR: Nid = Nid(100);
    const MODULE: Nid = Nid(200);
    const PATH: Nid = Nid(300);

    fn committed_version(stamps: &StampService, time: i64, payload: VersionPayload) -> Version {
        let key = stamps.key_for_stamp(Stamp::new(
            Status::Active,
            VersionTime::from_millis(time),
            AUTHOR,
            MODULE,
            PATH,
        ));
        Version::new(key, payload)
    }

    fn isa_graph(parents: &[i32]) -> VersionPayload {
        let mut b = ExpressionBuilder::new();
        let leaves: Vec<_> = parents
            .iter()
            .map(|p| b.concept(ConceptRef::Nid(Nid(*p))))
            .collect();
        let and = b.and(leaves);
        b.necessary_set(and);
        VersionPayload::LogicGraph(b.build().unwrap())
    }

    fn insert_isa(
        store: &ChronologyStore,
        stamps: &StampService,
        semantic: i32,
        component: i32,
        payload: VersionPayload,
    ) {
        store
            .insert(Chronology::new(
                ComponentId::new(Uuid::new_v4()),
                Nid(semantic),
                ISA,
                Some(Nid(component)),
                committed_version(stamps, 1_000, payload),
            ))
            .unwrap();
    }

    fn coordinate() -> ManifoldCoordinate {
        ManifoldCoordinate::stated(StampCoordinate::active_latest_on(PATH))
    }

    #[test]
    fn builds_edges_from_logic_graphs_and_component_refs() {
        let store = ChronologyStore::new();
        let stamps = StampService::new();
        insert_isa(&store, &stamps, 1, 10, isa_graph(&[1000]));
        insert_isa(&store, &stamps, 2, 11, isa_graph(&[1000, 10]));
        insert_isa(
            &store,
            &stamps,
            3,
            12,
            VersionPayload::ComponentRef { component: Nid(11) },
        );

        let snapshot = GraphTaxonomySnapshot::build(&store, &stamps, coordinate(), ISA);
        assert_eq!(snapshot.roots(), vec![Nid(1000)]);
        assert!(snapshot.is_child_of(Nid(10), Nid(1000)));
        assert!(snapshot.is_descendant_of(Nid(12), Nid(1000)));
        assert!(snapshot.is_leaf(Nid(12)));
        assert!(!snapshot.is_leaf(Nid(10)));
        assert!(snapshot.is_kind_of(Nid(12), Nid(12)).unwrap());
        assert_eq!(
            snapshot.kind_of_set(Nid(11)).unwrap(),
            BTreeSet::from([Nid(10), Nid(11), Nid(1000)])
        );
    }

    #[test]
    fn contradicted_semantic_is_skipped() {
        let store = ChronologyStore::new();
        let stamps = StampService::new();
        // Two versions committed at the same instant by different authors:
        // a contradiction under any coordinate.
        let mut chronology = Chronology::new(
            ComponentId::new(Uuid::new_v4()),
            Nid(1),
            ISA,
            Some(Nid(10)),
            committed_version(&stamps, 1_000, isa_graph(&[1000])),
        );
        chronology
            .create_mutable_version(
                &stamps,
                Status::Active,
                Nid(101),
                MODULE,
                PATH,
                isa_graph(&[2000]),
            )
            .unwrap();
        chronology
            .commit(&stamps, Nid(101), VersionTime::from_millis(1_000))
            .unwrap();
        store.insert(chronology).unwrap();

        let snapshot = GraphTaxonomySnapshot::build(&store, &stamps, coordinate(), ISA);
        assert_eq!(snapshot.tree().node_count(), 0);
    }

    #[test]
    fn path_origin_snapshot_mirrors_registered_origins() {
        let stamps = StampService::new();
        stamps.register_path_origin(Nid(301), Nid(300), VersionTime::from_millis(50));
        stamps.register_path_origin(Nid(302), Nid(301), VersionTime::from_millis(60));

        let snapshot = PathOriginSnapshot::build(&stamps, Nid(-20));
        assert_eq!(snapshot.parents_of(Nid(302)), vec![Nid(301)]);
        assert!(snapshot.is_descendant_of(Nid(302), Nid(300)));
        assert_eq!(snapshot.roots(), vec![Nid(300)]);
    }

    #[test]
    fn cache_reuses_and_invalidates() {
        let store = ChronologyStore::new();
        let stamps = StampService::new();
        insert_isa(&store, &stamps, 1, 10, isa_graph(&[1000]));

        let cache = SnapshotCache::new(4);
        let first = cache.get_or_build(&store, &stamps, &coordinate(), ISA);
        let second = cache.get_or_build(&store, &stamps, &coordinate(), ISA);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.invalidate();
        assert!(cache.is_empty());
        let third = cache.get_or_build(&store, &stamps, &coordinate(), ISA);
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn cache_evicts_in_insertion_order() {
        let store = ChronologyStore::new();
        let stamps = StampService::new();
        let cache = SnapshotCache::new(2);
        let a = coordinate();
        let b = ManifoldCoordinate::inferred(StampCoordinate::active_latest_on(PATH));
        let c = ManifoldCoordinate::stated(StampCoordinate::active_latest_on(Nid(301)));

        let kept_a = cache.get_or_build(&store, &stamps, &a, ISA);
        cache.get_or_build(&store, &stamps, &b, ISA);
        cache.get_or_build(&store, &stamps, &c, ISA);
        assert_eq!(cache.len(), 2);
        // a was evicted; rebuilding yields a fresh snapshot.
        let rebuilt_a = cache.get_or_build(&store, &stamps, &a, ISA);
        assert!(!Arc::ptr_eq(&kept_a, &rebuilt_a));
    }
}
