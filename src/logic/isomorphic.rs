//! Expression isomorphism: maximal common substructure between two
//! definitions, plus the additions/deletions that separate them.
//!
//! Candidate mappings are pruned to semantically compatible node pairs, then
//! a backtracking search over reference nodes in discovery order keeps the
//! best legal assignment. Determinism: ties break by shared-parent bonus,
//! then a SHA-256 of the assignment array, then the array itself.

use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};

use crate::tree::TreeNodeVisitData;

use super::expression::LogicalExpression;
use super::node::{LogicNode, NodeIndex, NodeKind};

/// Sentinel for "reference node is unmapped".
const UNMAPPED: i32 = -1;

/// One candidate assignment: `assignment[i] = j` maps reference node `i`
/// onto comparison node `j`, or [`UNMAPPED`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsomorphicSolution {
    assignment: Vec<i32>,
    score: usize,
    bonus: usize,
    digest: [u8; 32],
}

impl IsomorphicSolution {
    fn new(assignment: Vec<i32>, reference: &LogicalExpression) -> Self {
        let score = assignment.iter().filter(|j| **j != UNMAPPED).count();
        let bonus = shared_parent_bonus(&assignment, reference);
        let digest = assignment_digest(&assignment);
        Self {
            assignment,
            score,
            bonus,
            digest,
        }
    }

    pub fn assignment(&self) -> &[i32] {
        &self.assignment
    }

    /// Number of mapped reference nodes.
    pub fn score(&self) -> usize {
        self.score
    }

    /// Reference parents reused by at least two mapped children.
    pub fn shared_parent_bonus(&self) -> usize {
        self.bonus
    }

    pub fn mapped_reference(&self) -> BTreeSet<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter(|(_, j)| **j != UNMAPPED)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn mapped_comparison(&self) -> BTreeSet<usize> {
        self.assignment
            .iter()
            .filter(|j| **j != UNMAPPED)
            .map(|j| *j as usize)
            .collect()
    }

    /// Legality per the mapping contract: no comparison node used twice, and
    /// every mapped reference sibling group lands in one comparison sibling
    /// group.
    pub fn is_legal(&self, ref_data: &TreeNodeVisitData, comp_data: &TreeNodeVisitData) -> bool {
        let mut used = vec![false; comp_data.size()];
        for j in &self.assignment {
            if *j == UNMAPPED {
                continue;
            }
            let j = *j as usize;
            if j >= used.len() || used[j] {
                return false;
            }
            used[j] = true;
        }

        // group id (reference) -> comparison group id of its mapped members
        let mut group_images: HashMap<Option<usize>, Option<usize>> = HashMap::new();
        for (i, j) in self.assignment.iter().enumerate() {
            if *j == UNMAPPED {
                continue;
            }
            let image = comp_data.sibling_group(*j as usize);
            match group_images.entry(ref_data.sibling_group(i)) {
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(image);
                }
                std::collections::hash_map::Entry::Occupied(existing) => {
                    if *existing.get() != image {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Total-order comparison used to select the winner.
    fn better_than(&self, other: &IsomorphicSolution) -> bool {
        if self.score != other.score {
            return self.score > other.score;
        }
        if self.bonus != other.bonus {
            return self.bonus > other.bonus;
        }
        if self.digest != other.digest {
            return self.digest < other.digest;
        }
        self.assignment < other.assignment
    }
}

fn shared_parent_bonus(assignment: &[i32], reference: &LogicalExpression) -> usize {
    reference
        .nodes()
        .iter()
        .filter(|parent| {
            parent
                .children
                .iter()
                .filter(|c| assignment[c.as_usize()] != UNMAPPED)
                .count()
                >= 2
        })
        .count()
}

fn assignment_digest(assignment: &[i32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for j in assignment {
        hasher.update(j.to_be_bytes());
    }
    hasher.finalize().into()
}

/// The full comparison outcome.
#[derive(Clone, Debug)]
pub struct IsomorphicResults {
    /// Maximal common substructure, rebuilt over the reference's nodes.
    pub isomorphic_expression: LogicalExpression,
    /// Reference plus the comparison-only substructures grafted back on.
    pub merged_expression: LogicalExpression,
    /// Reference-side nodes with no image.
    pub additions: BTreeSet<NodeIndex>,
    /// Comparison-side nodes with no preimage.
    pub deletions: BTreeSet<NodeIndex>,
    /// Topmost node of each wholly-added substructure (reference side).
    pub added_relationship_roots: Vec<NodeIndex>,
    /// Topmost node of each wholly-deleted substructure (comparison side).
    pub deleted_relationship_roots: Vec<NodeIndex>,
    pub solution: IsomorphicSolution,
}

/// Compute the maximal common substructure of two expressions.
pub fn find_isomorphisms(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
) -> IsomorphicResults {
    let ref_data = reference.visit();
    let comp_data = comparison.visit();

    let solution = if reference.is_meaningful() && comparison.is_meaningful() {
        search_best(reference, comparison, &ref_data, &comp_data)
    } else {
        // No definable relationship content on one side: fully added /
        // fully deleted, no search.
        IsomorphicSolution::new(vec![UNMAPPED; reference.node_count()], reference)
    };

    build_results(reference, comparison, &ref_data, &comp_data, solution)
}

fn search_best(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
    ref_data: &TreeNodeVisitData,
    comp_data: &TreeNodeVisitData,
) -> IsomorphicSolution {
    // Candidates: same payload (kind equality disregards children), so
    // concept/feature/role nodes only pair with the same referenced type.
    let candidates: Vec<Vec<usize>> = reference
        .nodes()
        .iter()
        .map(|r| {
            comparison
                .nodes()
                .iter()
                .filter(|c| r.matches_ignoring_children(c))
                .map(|c| c.index.as_usize())
                .collect()
        })
        .collect();

    // Reference nodes in discovery order: parents precede children, so the
    // predecessor constraint is resolvable at assignment time.
    let mut order: Vec<usize> = (0..reference.node_count()).collect();
    order.sort_by_key(|i| ref_data.discovery_time(*i));

    let mut search = Search {
        reference,
        ref_data,
        comp_data,
        candidates,
        order,
        assignment: vec![UNMAPPED; reference.node_count()],
        used: vec![false; comparison.node_count()],
        best: None,
    };
    search.descend(0);
    search
        .best
        .unwrap_or_else(|| IsomorphicSolution::new(vec![UNMAPPED; reference.node_count()], reference))
}

struct Search<'a> {
    reference: &'a LogicalExpression,
    ref_data: &'a TreeNodeVisitData,
    comp_data: &'a TreeNodeVisitData,
    candidates: Vec<Vec<usize>>,
    order: Vec<usize>,
    assignment: Vec<i32>,
    used: Vec<bool>,
    best: Option<IsomorphicSolution>,
}

impl Search<'_> {
    fn descend(&mut self, position: usize) {
        if position == self.order.len() {
            let solution = IsomorphicSolution::new(self.assignment.clone(), self.reference);
            if self
                .best
                .as_ref()
                .map_or(true, |best| solution.better_than(best))
            {
                self.best = Some(solution);
            }
            return;
        }

        let node = self.order[position];
        // A node is mappable only under a mapped predecessor (or at the
        // root); its image must sit under the predecessor's image. This
        // keeps every partial assignment legal by construction.
        let required_image_predecessor = match self.ref_data.predecessor(node) {
            None => None,
            Some(p) => match self.assignment[p] {
                UNMAPPED => {
                    self.descend(position + 1);
                    return;
                }
                image => Some(image as usize),
            },
        };

        for slot in 0..self.candidates[node].len() {
            let candidate = self.candidates[node][slot];
            if self.used[candidate] {
                continue;
            }
            if self.comp_data.predecessor(candidate) != required_image_predecessor {
                continue;
            }
            self.assignment[node] = candidate as i32;
            self.used[candidate] = true;
            self.descend(position + 1);
            self.used[candidate] = false;
            self.assignment[node] = UNMAPPED;
        }
        // The unmapped branch: this node (and its subtree) is an addition.
        self.descend(position + 1);
    }
}

fn build_results(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
    ref_data: &TreeNodeVisitData,
    comp_data: &TreeNodeVisitData,
    solution: IsomorphicSolution,
) -> IsomorphicResults {
    let mapped_ref = solution.mapped_reference();
    let mapped_comp = solution.mapped_comparison();

    let additions: BTreeSet<NodeIndex> = (0..reference.node_count())
        .filter(|i| !mapped_ref.contains(i))
        .map(|i| NodeIndex(i as u32))
        .collect();
    let deletions: BTreeSet<NodeIndex> = (0..comparison.node_count())
        .filter(|j| !mapped_comp.contains(j))
        .map(|j| NodeIndex(j as u32))
        .collect();

    // Relationship roots: the topmost node of each maximal wholly-added
    // (resp. wholly-deleted) subtree, i.e. an unmapped node whose
    // predecessor is mapped or absent.
    let added_relationship_roots: Vec<NodeIndex> = additions
        .iter()
        .copied()
        .filter(|i| match ref_data.predecessor(i.as_usize()) {
            None => true,
            Some(p) => mapped_ref.contains(&p),
        })
        .collect();
    let deleted_relationship_roots: Vec<NodeIndex> = deletions
        .iter()
        .copied()
        .filter(|j| match comp_data.predecessor(j.as_usize()) {
            None => true,
            Some(q) => mapped_comp.contains(&q),
        })
        .collect();

    let isomorphic_expression = extract(reference, &mapped_ref);
    let merged_expression = merge(
        reference,
        comparison,
        comp_data,
        &solution,
        &deleted_relationship_roots,
    );

    IsomorphicResults {
        isomorphic_expression,
        merged_expression,
        additions,
        deletions,
        added_relationship_roots,
        deleted_relationship_roots,
        solution,
    }
}

/// Rebuild the reference expression over a kept node set. The kept set is
/// upward-closed to the root, so the result is a valid tree.
fn extract(expression: &LogicalExpression, keep: &BTreeSet<usize>) -> LogicalExpression {
    let root = expression.root_index().as_usize();
    if !keep.contains(&root) {
        return LogicalExpression::from_parts_unchecked(
            vec![LogicNode::new(NodeIndex(0), Vec::new(), NodeKind::Root)],
            NodeIndex(0),
            expression.concept_nid(),
            expression.target(),
        );
    }

    let remap: HashMap<usize, u32> = keep
        .iter()
        .enumerate()
        .map(|(new, old)| (*old, new as u32))
        .collect();
    let nodes: Vec<LogicNode> = keep
        .iter()
        .map(|old| {
            let node = &expression.nodes()[*old];
            let children = node
                .children
                .iter()
                .filter(|c| keep.contains(&c.as_usize()))
                .map(|c| NodeIndex(remap[&c.as_usize()]))
                .collect();
            LogicNode::new(NodeIndex(remap[old]), children, node.kind.clone())
        })
        .collect();
    LogicalExpression::from_parts_unchecked(
        nodes,
        NodeIndex(remap[&root]),
        expression.concept_nid(),
        expression.target(),
    )
}

/// Reference expression plus every wholly-deleted comparison substructure
/// grafted under the reference image of its attachment point.
fn merge(
    reference: &LogicalExpression,
    comparison: &LogicalExpression,
    comp_data: &TreeNodeVisitData,
    solution: &IsomorphicSolution,
    deleted_roots: &[NodeIndex],
) -> LogicalExpression {
    // comparison index -> reference preimage
    let preimage: HashMap<usize, usize> = solution
        .assignment()
        .iter()
        .enumerate()
        .filter(|(_, j)| **j != UNMAPPED)
        .map(|(i, j)| (*j as usize, i))
        .collect();

    let mut nodes: Vec<LogicNode> = reference.nodes().to_vec();
    for deleted in deleted_roots {
        let Some(attach_under) = comp_data
            .predecessor(deleted.as_usize())
            .and_then(|q| preimage.get(&q).copied())
        else {
            // The whole comparison is deleted; nothing to graft onto.
            continue;
        };

        // Copy the comparison subtree, preorder, with fresh indices.
        let mut subtree = Vec::new();
        let mut stack = vec![deleted.as_usize()];
        while let Some(old) = stack.pop() {
            subtree.push(old);
            for child in comparison.nodes()[old].children.iter().rev() {
                stack.push(child.as_usize());
            }
        }
        let base = nodes.len() as u32;
        let remap: HashMap<usize, u32> = subtree
            .iter()
            .enumerate()
            .map(|(offset, old)| (*old, base + offset as u32))
            .collect();
        for old in &subtree {
            let node = &comparison.nodes()[*old];
            let children = node
                .children
                .iter()
                .map(|c| NodeIndex(remap[&c.as_usize()]))
                .collect();
            nodes.push(LogicNode::new(
                NodeIndex(remap[old]),
                children,
                node.kind.clone(),
            ));
        }
        nodes[attach_under].children.push(NodeIndex(remap[&deleted.as_usize()]));
    }

    LogicalExpression::from_parts_unchecked(
        nodes,
        reference.root_index(),
        reference.concept_nid(),
        reference.target(),
    )
}

#[cfg(test)]
mod tests {
    use crate::core::Nid;
    use crate::logic::builder::ExpressionBuilder;
    use crate::logic::node::ConceptRef;

    use super::*;

    fn definition(parents: &[i32], role: Option<(i32, i32)>) -> LogicalExpression {
        let mut b = ExpressionBuilder::new();
        let mut elements = Vec::new();
        for p in parents {
            elements.push(b.concept(ConceptRef::Nid(Nid(*p))));
        }
        if let Some((role_type, value)) = role {
            let value = b.concept(ConceptRef::Nid(Nid(value)));
            elements.push(b.role_some(ConceptRef::Nid(Nid(role_type)), value));
        }
        let and = b.and(elements);
        b.sufficient_set(and);
        b.build().unwrap()
    }

    #[test]
    fn self_isomorphism_is_total_and_legal() {
        let e = definition(&[10, 11], Some((30, 40)));
        let results = find_isomorphisms(&e, &e);

        assert_eq!(results.solution.score(), e.node_count());
        assert!(results
            .solution
            .is_legal(&e.visit(), &e.visit()));
        assert_eq!(
            results.isomorphic_expression.node_count(),
            e.node_count()
        );
        assert!(results.additions.is_empty());
        assert!(results.deletions.is_empty());
        assert_eq!(results.merged_expression, e);
    }

    #[test]
    fn single_leaf_change_yields_one_added_one_deleted_root() {
        let reference = definition(&[10, 11], None);
        let comparison = definition(&[10, 12], None);
        let results = find_isomorphisms(&reference, &comparison);

        assert_eq!(results.added_relationship_roots.len(), 1);
        assert_eq!(results.deleted_relationship_roots.len(), 1);
        // Everything above the changed leaf still matches.
        assert_eq!(
            results.isomorphic_expression.node_count(),
            reference.node_count() - 1
        );
        let added = results.added_relationship_roots[0];
        assert!(matches!(
            reference.node(added).kind,
            NodeKind::Concept {
                concept: ConceptRef::Nid(Nid(11))
            }
        ));
    }

    #[test]
    fn role_type_change_unmatches_whole_restriction() {
        let reference = definition(&[10], Some((30, 40)));
        let comparison = definition(&[10], Some((31, 40)));
        let results = find_isomorphisms(&reference, &comparison);

        // The role node has no candidate, so it and its value are added;
        // the topmost added node is the restriction itself.
        assert_eq!(results.added_relationship_roots.len(), 1);
        let added = results.added_relationship_roots[0];
        assert!(matches!(
            reference.node(added).kind,
            NodeKind::RoleSome { .. }
        ));
        assert_eq!(results.additions.len(), 2);
    }

    #[test]
    fn merged_expression_contains_both_sides() {
        let reference = definition(&[10, 11], None);
        let comparison = definition(&[10, 12], None);
        let results = find_isomorphisms(&reference, &comparison);

        let merged = &results.merged_expression;
        assert_eq!(merged.node_count(), reference.node_count() + 1);
        let targets = merged.isa_target_nids();
        assert_eq!(targets, vec![Nid(10), Nid(11), Nid(12)]);
    }

    #[test]
    fn meaningless_expression_short_circuits() {
        let mut b = ExpressionBuilder::new();
        let and = b.and(vec![]);
        b.necessary_set(and);
        let empty = b.build().unwrap();
        let full = definition(&[10], None);

        let results = find_isomorphisms(&empty, &full);
        assert_eq!(results.solution.score(), 0);
        assert_eq!(results.additions.len(), empty.node_count());
        assert_eq!(results.deletions.len(), full.node_count());
    }

    #[test]
    fn deterministic_under_symmetry() {
        // Two identical leaves on each side: several maximal solutions
        // exist; the tie-break must pick the same one every run.
        let reference = definition(&[10, 10], None);
        let comparison = definition(&[10, 10], None);
        let first = find_isomorphisms(&reference, &comparison);
        for _ in 0..5 {
            let again = find_isomorphisms(&reference, &comparison);
            assert_eq!(again.solution, first.solution);
        }
    }
}
