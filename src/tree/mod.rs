//! Tree-visit bookkeeping.
//!
//! Reusable traversal-state structure shared by the isomorphism engine and
//! taxonomy traversal. Created fresh per traversal, sized to the traversal's
//! graph, and handed back to the caller for summary queries. Nodes are dense
//! indices; callers own the mapping from their id space.

use std::collections::BTreeSet;

/// Traversal status of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitStatus {
    Undiscovered,
    /// On the active traversal front (discovery seen, finish pending).
    Processing,
    Finished,
}

/// Per-traversal bookkeeping, indexed by dense node index.
#[derive(Clone, Debug)]
pub struct TreeNodeVisitData {
    status: Vec<VisitStatus>,
    discovery: Vec<Option<u32>>,
    finish: Vec<Option<u32>>,
    distance: Vec<u32>,
    predecessor: Vec<Option<usize>>,
    /// Sibling group id: nodes sharing an immediate predecessor share one.
    sibling_group: Vec<Option<usize>>,
    leaves: BTreeSet<usize>,
    /// Each cycle stored as a sorted id vector for deduplication.
    cycles: BTreeSet<Vec<usize>>,
    clock: u32,
}

impl TreeNodeVisitData {
    pub fn new(size: usize) -> Self {
        Self {
            status: vec![VisitStatus::Undiscovered; size],
            discovery: vec![None; size],
            finish: vec![None; size],
            distance: vec![0; size],
            predecessor: vec![None; size],
            sibling_group: vec![None; size],
            leaves: BTreeSet::new(),
            cycles: BTreeSet::new(),
            clock: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.status.len()
    }

    pub fn status(&self, node: usize) -> VisitStatus {
        self.status[node]
    }

    /// Mark discovery: status becomes Processing, discovery time assigned.
    pub fn start_processing(&mut self, node: usize) {
        self.status[node] = VisitStatus::Processing;
        self.discovery[node] = Some(self.clock);
        self.clock += 1;
    }

    /// Mark completion: status becomes Finished, finish time assigned.
    pub fn finish(&mut self, node: usize) {
        self.status[node] = VisitStatus::Finished;
        self.finish[node] = Some(self.clock);
        self.clock += 1;
    }

    /// Record the tree edge predecessor -> child: predecessor, distance,
    /// and sibling group (the predecessor id) for the child.
    pub fn set_edge(&mut self, child: usize, predecessor: usize) {
        self.predecessor[child] = Some(predecessor);
        self.distance[child] = self.distance[predecessor] + 1;
        self.sibling_group[child] = Some(predecessor);
    }

    pub fn discovery_time(&self, node: usize) -> Option<u32> {
        self.discovery[node]
    }

    pub fn finish_time(&self, node: usize) -> Option<u32> {
        self.finish[node]
    }

    pub fn distance(&self, node: usize) -> u32 {
        self.distance[node]
    }

    pub fn predecessor(&self, node: usize) -> Option<usize> {
        self.predecessor[node]
    }

    pub fn sibling_group(&self, node: usize) -> Option<usize> {
        self.sibling_group[node]
    }

    /// Whether two nodes share an immediate predecessor. Two roots (no
    /// predecessor) are treated as one group.
    pub fn same_sibling_group(&self, a: usize, b: usize) -> bool {
        self.sibling_group[a] == self.sibling_group[b]
    }

    pub fn add_leaf(&mut self, node: usize) {
        self.leaves.insert(node);
    }

    pub fn leaves(&self) -> &BTreeSet<usize> {
        &self.leaves
    }

    /// Record one cycle. The path is sorted before insertion so the same
    /// cycle found from different entry points deduplicates.
    pub fn record_cycle(&mut self, path: &[usize]) {
        let mut sorted: Vec<usize> = path.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        self.cycles.insert(sorted);
    }

    pub fn cycles(&self) -> &BTreeSet<Vec<usize>> {
        &self.cycles
    }

    /// Nodes discovered so far (Processing or Finished).
    pub fn visited_count(&self) -> usize {
        self.status
            .iter()
            .filter(|s| !matches!(s, VisitStatus::Undiscovered))
            .count()
    }

    /// Walk the predecessor chain from `node` back to the traversal root.
    pub fn path_to_root(&self, node: usize) -> Vec<usize> {
        let mut path = vec![node];
        let mut current = node;
        while let Some(previous) = self.predecessor[current] {
            // Predecessor chains in a valid traversal are acyclic; guard
            // against corrupt input anyway.
            if path.contains(&previous) {
                break;
            }
            path.push(previous);
            current = previous;
        }
        path
    }
}
