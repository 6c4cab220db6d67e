//! Nid-keyed taxonomy graph with cycle-tolerant traversal.
//!
//! Nodes are interned into a dense index space so traversal bookkeeping is
//! plain array access; callers speak nids throughout.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::core::Nid;
use crate::tree::{TreeNodeVisitData, VisitStatus};

use super::TaxonomyLink;

/// Parent/child link maps over interned nids.
#[derive(Clone, Debug, Default)]
pub struct Tree {
    nids: Vec<Nid>,
    index_of: HashMap<Nid, usize>,
    child_links: Vec<Vec<TaxonomyLink>>,
    parent_links: Vec<Vec<TaxonomyLink>>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, nid: Nid) -> usize {
        if let Some(index) = self.index_of.get(&nid) {
            return *index;
        }
        let index = self.nids.len();
        self.nids.push(nid);
        self.index_of.insert(nid, index);
        self.child_links.push(Vec::new());
        self.parent_links.push(Vec::new());
        index
    }

    /// Register a node with no edges yet. Idempotent.
    pub fn add_node(&mut self, nid: Nid) {
        self.intern(nid);
    }

    /// Record `child` is-a `parent`, typed by the source assemblage.
    /// Duplicate edges collapse.
    pub fn add_edge(&mut self, child: Nid, parent: Nid, type_nid: Nid) {
        let child_index = self.intern(child);
        let parent_index = self.intern(parent);
        let down = TaxonomyLink::new(type_nid, child);
        if !self.child_links[parent_index].contains(&down) {
            self.child_links[parent_index].push(down);
        }
        let up = TaxonomyLink::new(type_nid, parent);
        if !self.parent_links[child_index].contains(&up) {
            self.parent_links[child_index].push(up);
        }
    }

    pub fn node_count(&self) -> usize {
        self.nids.len()
    }

    pub fn contains(&self, nid: Nid) -> bool {
        self.index_of.contains_key(&nid)
    }

    pub fn nids(&self) -> &[Nid] {
        &self.nids
    }

    /// Dense index of a nid within this tree's bookkeeping space.
    pub fn index_of(&self, nid: Nid) -> Option<usize> {
        self.index_of.get(&nid).copied()
    }

    pub fn nid_at(&self, index: usize) -> Nid {
        self.nids[index]
    }

    pub fn child_links_of(&self, nid: Nid) -> Vec<TaxonomyLink> {
        self.index_of(nid)
            .map(|i| self.child_links[i].clone())
            .unwrap_or_default()
    }

    pub fn parent_links_of(&self, nid: Nid) -> Vec<TaxonomyLink> {
        self.index_of(nid)
            .map(|i| self.parent_links[i].clone())
            .unwrap_or_default()
    }

    pub fn children_of(&self, nid: Nid) -> Vec<Nid> {
        self.index_of(nid)
            .map(|i| self.child_links[i].iter().map(|l| l.destination).collect())
            .unwrap_or_default()
    }

    pub fn parents_of(&self, nid: Nid) -> Vec<Nid> {
        self.index_of(nid)
            .map(|i| self.parent_links[i].iter().map(|l| l.destination).collect())
            .unwrap_or_default()
    }

    /// Nodes with no parents, ascending by nid.
    pub fn roots(&self) -> Vec<Nid> {
        let mut roots: Vec<Nid> = (0..self.nids.len())
            .filter(|i| self.parent_links[*i].is_empty())
            .map(|i| self.nids[i])
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Level-order walk from `start` over child edges. The callback fires at
    /// discovery time, not at finish.
    pub fn breadth_first_visit(
        &self,
        start: Nid,
        mut visit: impl FnMut(Nid),
    ) -> TreeNodeVisitData {
        let mut data = TreeNodeVisitData::new(self.nids.len());
        let Some(start_index) = self.index_of(start) else {
            return data;
        };

        let mut queue = VecDeque::new();
        data.start_processing(start_index);
        visit(start);
        queue.push_back(start_index);
        while let Some(node) = queue.pop_front() {
            for link in &self.child_links[node] {
                let child = self.index_of[&link.destination];
                if data.status(child) == VisitStatus::Undiscovered {
                    data.set_edge(child, node);
                    data.start_processing(child);
                    visit(link.destination);
                    queue.push_back(child);
                }
            }
            if self.child_links[node].is_empty() {
                data.add_leaf(node);
            }
            data.finish(node);
        }
        data
    }

    /// Depth-first walk from `start` over child edges, iterative.
    ///
    /// An edge into a node still Processing closes a cycle: the path from
    /// that node back to the current one is recorded and the edge is not
    /// descended.
    pub fn depth_first_visit(
        &self,
        start: Nid,
        mut visit: impl FnMut(Nid),
    ) -> TreeNodeVisitData {
        let mut data = TreeNodeVisitData::new(self.nids.len());
        let Some(start_index) = self.index_of(start) else {
            return data;
        };

        data.start_processing(start_index);
        visit(start);
        let mut stack: Vec<(usize, usize)> = vec![(start_index, 0)];
        while let Some((node, cursor)) = stack.last_mut() {
            let node = *node;
            if *cursor < self.child_links[node].len() {
                let link = self.child_links[node][*cursor];
                *cursor += 1;
                let child = self.index_of[&link.destination];
                match data.status(child) {
                    VisitStatus::Undiscovered => {
                        data.set_edge(child, node);
                        data.start_processing(child);
                        visit(link.destination);
                        stack.push((child, 0));
                    }
                    VisitStatus::Processing => {
                        // Back edge. The child is an ancestor on the stack,
                        // so the predecessor chain from here reaches it.
                        let path = data.path_to_root(node);
                        if let Some(position) = path.iter().position(|n| *n == child) {
                            data.record_cycle(&path[..=position]);
                        }
                    }
                    VisitStatus::Finished => {}
                }
            } else {
                if self.child_links[node].is_empty() {
                    data.add_leaf(node);
                }
                data.finish(node);
                stack.pop();
            }
        }
        data
    }

    /// Invert the parent-edges reachable from `child` into a new tree rooted
    /// at `child`: each ancestor becomes a descendant of the node it was a
    /// parent of.
    pub fn ancestor_tree(&self, child: Nid) -> Tree {
        let mut inverted = Tree::new();
        let Some(start) = self.index_of(child) else {
            return inverted;
        };
        inverted.add_node(child);

        let mut visited = vec![false; self.nids.len()];
        visited[start] = true;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for link in &self.parent_links[node] {
                inverted.add_edge(link.destination, self.nids[node], link.type_nid);
                let parent = self.index_of[&link.destination];
                if !visited[parent] {
                    visited[parent] = true;
                    stack.push(parent);
                }
            }
        }
        inverted
    }

    /// All descendants of `node`, inclusive of the node itself.
    ///
    /// Terminates on cyclic input: each node is expanded at most once.
    pub fn descendant_nid_set(&self, node: Nid) -> BTreeSet<Nid> {
        self.closure(node, |index| &self.child_links[index])
    }

    /// All ancestors of `node`, inclusive of the node itself.
    pub fn ancestor_nid_set(&self, node: Nid) -> BTreeSet<Nid> {
        self.closure(node, |index| &self.parent_links[index])
    }

    fn closure<'a>(
        &'a self,
        node: Nid,
        edges: impl Fn(usize) -> &'a Vec<TaxonomyLink>,
    ) -> BTreeSet<Nid> {
        let mut result = BTreeSet::new();
        let Some(start) = self.index_of(node) else {
            return result;
        };
        let mut visited = vec![false; self.nids.len()];
        visited[start] = true;
        result.insert(node);
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for link in edges(current) {
                let next = self.index_of[&link.destination];
                if !visited[next] {
                    visited[next] = true;
                    result.insert(link.destination);
                    stack.push(next);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISA: Nid = Nid(-1);

    /// root(1) -> {2, 3}; 2 -> 4; 3 -> 4 (diamond).
    fn diamond() -> Tree {
        let mut tree = Tree::new();
        tree.add_edge(Nid(2), Nid(1), ISA);
        tree.add_edge(Nid(3), Nid(1), ISA);
        tree.add_edge(Nid(4), Nid(2), ISA);
        tree.add_edge(Nid(4), Nid(3), ISA);
        tree
    }

    #[test]
    fn link_maps_and_roots() {
        let tree = diamond();
        assert_eq!(tree.roots(), vec![Nid(1)]);
        assert_eq!(tree.parents_of(Nid(4)), vec![Nid(2), Nid(3)]);
        assert_eq!(tree.children_of(Nid(1)), vec![Nid(2), Nid(3)]);
        assert!(tree.children_of(Nid(99)).is_empty());
        let links = tree.parent_links_of(Nid(2));
        assert_eq!(links, vec![TaxonomyLink::new(ISA, Nid(1))]);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut tree = Tree::new();
        tree.add_edge(Nid(2), Nid(1), ISA);
        tree.add_edge(Nid(2), Nid(1), ISA);
        assert_eq!(tree.children_of(Nid(1)).len(), 1);
    }

    #[test]
    fn breadth_first_fires_callback_at_discovery_in_level_order() {
        let tree = diamond();
        let mut seen = Vec::new();
        let data = tree.breadth_first_visit(Nid(1), |nid| seen.push(nid));
        assert_eq!(seen, vec![Nid(1), Nid(2), Nid(3), Nid(4)]);
        assert_eq!(data.visited_count(), 4);
        // 4 was reached through 2, the first discoverer.
        let four = tree.index_of(Nid(4)).unwrap();
        assert_eq!(data.predecessor(four), tree.index_of(Nid(2)));
        assert_eq!(data.distance(four), 2);
    }

    #[test]
    fn depth_first_assigns_nested_finish_times() {
        let tree = diamond();
        let data = tree.depth_first_visit(Nid(1), |_| {});
        let root = tree.index_of(Nid(1)).unwrap();
        let four = tree.index_of(Nid(4)).unwrap();
        assert!(data.discovery_time(root) < data.discovery_time(four));
        assert!(data.finish_time(four) < data.finish_time(root));
        assert!(data.cycles().is_empty());
        assert!(data.leaves().contains(&four));
    }

    #[test]
    fn cycle_is_recorded_not_recursed() {
        let mut tree = Tree::new();
        tree.add_edge(Nid(2), Nid(1), ISA);
        tree.add_edge(Nid(3), Nid(2), ISA);
        tree.add_edge(Nid(1), Nid(3), ISA);

        let data = tree.depth_first_visit(Nid(1), |_| {});
        assert_eq!(data.cycles().len(), 1);
        let cycle: BTreeSet<Nid> = data.cycles().iter().next().unwrap()
            .iter()
            .map(|i| tree.nid_at(*i))
            .collect();
        assert_eq!(cycle, BTreeSet::from([Nid(1), Nid(2), Nid(3)]));
    }

    #[test]
    fn descendant_set_terminates_over_cycles() {
        let mut tree = Tree::new();
        tree.add_edge(Nid(2), Nid(1), ISA);
        tree.add_edge(Nid(3), Nid(2), ISA);
        tree.add_edge(Nid(1), Nid(3), ISA);

        let set = tree.descendant_nid_set(Nid(1));
        assert_eq!(set, BTreeSet::from([Nid(1), Nid(2), Nid(3)]));
    }

    #[test]
    fn ancestor_tree_inverts_edges() {
        let tree = diamond();
        let inverted = tree.ancestor_tree(Nid(4));

        assert_eq!(inverted.roots(), vec![Nid(4)]);
        assert_eq!(inverted.children_of(Nid(4)), vec![Nid(2), Nid(3)]);
        let mut parents = inverted.parents_of(Nid(1));
        parents.sort_unstable();
        assert_eq!(parents, vec![Nid(2), Nid(3)]);
        assert!(inverted.children_of(Nid(1)).is_empty());
    }

    #[test]
    fn ancestor_set_is_inclusive() {
        let tree = diamond();
        assert_eq!(
            tree.ancestor_nid_set(Nid(4)),
            BTreeSet::from([Nid(1), Nid(2), Nid(3), Nid(4)])
        );
    }
}
