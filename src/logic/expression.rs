//! Logical expressions: an arena of nodes with one designated root.
//!
//! INVARIANT: the graph rooted at the designated root is a tree — acyclic,
//! every non-root node reachable from exactly one parent. Validated on build
//! and on wire decode.
//!
//! Structural equality and hashing go through a canonical byte form in which
//! children of commutative connectors are sorted, so two expressions built in
//! different child orders compare equal.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::core::{CoreError, IdentifierService, Nid};
use crate::tree::TreeNodeVisitData;

use super::builder::BuildError;
use super::node::{ConceptRef, LogicNode, NodeIndex, NodeKind, NodeSemantic};

/// How component references inside node records are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTarget {
    /// Dense integer ids, valid within one store instance.
    Internal,
    /// UUIDs, valid for interchange.
    External,
}

/// A description-logic definition as a node arena.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogicalExpression {
    nodes: Vec<LogicNode>,
    root: NodeIndex,
    /// Back-reference to the concept this expression defines, when known.
    concept_nid: Option<Nid>,
    target: DataTarget,
}

impl LogicalExpression {
    /// Assemble and validate an expression from parts.
    pub fn from_parts(
        nodes: Vec<LogicNode>,
        root: NodeIndex,
        concept_nid: Option<Nid>,
        target: DataTarget,
    ) -> Result<Self, BuildError> {
        validate_tree(&nodes, root)?;
        Ok(Self {
            nodes,
            root,
            concept_nid,
            target,
        })
    }

    /// Internal constructor for shapes produced by validated transforms.
    pub(crate) fn from_parts_unchecked(
        nodes: Vec<LogicNode>,
        root: NodeIndex,
        concept_nid: Option<Nid>,
        target: DataTarget,
    ) -> Self {
        debug_assert!(validate_tree(&nodes, root).is_ok());
        Self {
            nodes,
            root,
            concept_nid,
            target,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[LogicNode] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &LogicNode {
        &self.nodes[index.as_usize()]
    }

    pub fn root_index(&self) -> NodeIndex {
        self.root
    }

    pub fn root_node(&self) -> &LogicNode {
        self.node(self.root)
    }

    pub fn concept_nid(&self) -> Option<Nid> {
        self.concept_nid
    }

    pub fn set_concept_nid(&mut self, nid: Nid) {
        self.concept_nid = Some(nid);
    }

    pub fn target(&self) -> DataTarget {
        self.target
    }

    pub fn children_of(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.node(index).children
    }

    /// Whether this expression carries definable relationship content: some
    /// definition set whose connector has at least one element.
    pub fn is_meaningful(&self) -> bool {
        self.children_of(self.root).iter().any(|set| {
            let set = self.node(*set);
            set.semantic().is_definition_set()
                && set
                    .children
                    .iter()
                    .any(|connector| !self.node(*connector).children.is_empty())
        })
    }

    /// Depth-first traversal from the root, returning fresh bookkeeping:
    /// discovery/finish times, distance, predecessor, sibling group, leaves.
    pub fn visit(&self) -> TreeNodeVisitData {
        let mut data = TreeNodeVisitData::new(self.nodes.len());
        // (node, next child position) frames; the tree invariant bounds the
        // stack by expression depth.
        let root = self.root.as_usize();
        data.start_processing(root);
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some((node, child_pos)) = stack.pop() {
            let children = &self.nodes[node].children;
            if child_pos == 0 && children.is_empty() {
                data.add_leaf(node);
            }
            if child_pos < children.len() {
                stack.push((node, child_pos + 1));
                let child = children[child_pos].as_usize();
                data.set_edge(child, node);
                data.start_processing(child);
                stack.push((child, 0));
            } else {
                data.finish(node);
            }
        }
        data
    }

    /// Is-a targets: concepts asserted directly under the definition sets'
    /// connectors. Role restrictions are not is-a edges.
    pub fn isa_target_nids(&self) -> Vec<Nid> {
        let mut targets = Vec::new();
        for set in self.children_of(self.root) {
            let set = self.node(*set);
            if !set.semantic().is_definition_set() {
                continue;
            }
            for connector in &set.children {
                for element in self.children_of(*connector) {
                    if let NodeKind::Concept {
                        concept: ConceptRef::Nid(nid),
                    } = self.node(*element).kind
                    {
                        targets.push(nid);
                    }
                }
            }
        }
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Convert to the external/interchange target: every nid reference
    /// becomes its UUID. Pure and lossless.
    pub fn to_external(&self, ids: &dyn IdentifierService) -> Result<LogicalExpression, CoreError> {
        let nodes = self.map_nodes(|r| match r {
            ConceptRef::Nid(nid) => Ok(ConceptRef::Uuid(ids.uuid_for_nid(nid)?)),
            external @ ConceptRef::Uuid(_) => Ok(external),
        })?;
        Ok(Self {
            nodes,
            root: self.root,
            concept_nid: self.concept_nid,
            target: DataTarget::External,
        })
    }

    /// Convert to the internal target: every UUID reference becomes its nid,
    /// assigning on first sight (identifier assignment is the service's job).
    pub fn to_internal(&self, ids: &dyn IdentifierService) -> Result<LogicalExpression, CoreError> {
        let nodes = self.map_nodes(|r| match r {
            ConceptRef::Uuid(uuid) => Ok(ConceptRef::Nid(ids.nid_for_uuid(uuid))),
            internal @ ConceptRef::Nid(_) => Ok(internal),
        })?;
        Ok(Self {
            nodes,
            root: self.root,
            concept_nid: self.concept_nid,
            target: DataTarget::Internal,
        })
    }

    fn map_nodes<E>(
        &self,
        mut f: impl FnMut(ConceptRef) -> Result<ConceptRef, E>,
    ) -> Result<Vec<LogicNode>, E> {
        self.nodes
            .iter()
            .map(|n| {
                Ok(LogicNode::new(
                    n.index,
                    n.children.clone(),
                    n.kind.map_refs(&mut f)?,
                ))
            })
            .collect()
    }

    /// Canonical byte form. Deterministic; commutative-connector children
    /// are sorted so child order does not affect it.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_node_bytes(self.root)
    }

    fn canonical_node_bytes(&self, index: NodeIndex) -> Vec<u8> {
        let node = self.node(index);
        let mut out = kind_canonical_bytes(&node.kind);
        let mut child_forms: Vec<Vec<u8>> = node
            .children
            .iter()
            .map(|c| self.canonical_node_bytes(*c))
            .collect();
        if node.semantic().is_commutative() {
            child_forms.sort();
        }
        out.extend_from_slice(&(child_forms.len() as u32).to_be_bytes());
        for form in child_forms {
            out.extend_from_slice(&(form.len() as u32).to_be_bytes());
            out.extend_from_slice(&form);
        }
        out
    }
}

impl PartialEq for LogicalExpression {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bytes() == other.canonical_bytes()
    }
}

impl Eq for LogicalExpression {}

impl Hash for LogicalExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bytes().hash(state);
    }
}

fn kind_canonical_bytes(kind: &NodeKind) -> Vec<u8> {
    let mut out = vec![semantic_tag(kind.semantic())];
    for r in kind.refs() {
        match r {
            ConceptRef::Nid(nid) => {
                out.push(0);
                out.extend_from_slice(&nid.value().to_be_bytes());
            }
            ConceptRef::Uuid(uuid) => {
                out.push(1);
                out.extend_from_slice(uuid.as_bytes());
            }
        }
    }
    match kind {
        NodeKind::Feature { operator, .. } => out.push(*operator as u8),
        NodeKind::LiteralBoolean { value } => out.push(u8::from(*value)),
        NodeKind::LiteralFloat { value } => out.extend_from_slice(&value.to_bits().to_be_bytes()),
        NodeKind::LiteralInstant { epoch_millis } => {
            out.extend_from_slice(&epoch_millis.to_be_bytes());
        }
        NodeKind::LiteralInteger { value } => out.extend_from_slice(&value.to_be_bytes()),
        NodeKind::LiteralString { value } => {
            out.extend_from_slice(&(value.len() as u32).to_be_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        NodeKind::Substitution { value_kind, field } => {
            out.push(*value_kind as u8);
            out.extend_from_slice(&(field.len() as u32).to_be_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        _ => {}
    }
    out
}

pub(crate) fn semantic_tag(semantic: NodeSemantic) -> u8 {
    match semantic {
        NodeSemantic::Root => 0,
        NodeSemantic::NecessarySet => 1,
        NodeSemantic::SufficientSet => 2,
        NodeSemantic::And => 3,
        NodeSemantic::Or => 4,
        NodeSemantic::DisjointWith => 5,
        NodeSemantic::RoleSome => 6,
        NodeSemantic::RoleAll => 7,
        NodeSemantic::Concept => 8,
        NodeSemantic::Feature => 9,
        NodeSemantic::LiteralBoolean => 10,
        NodeSemantic::LiteralFloat => 11,
        NodeSemantic::LiteralInstant => 12,
        NodeSemantic::LiteralInteger => 13,
        NodeSemantic::LiteralString => 14,
        NodeSemantic::Substitution => 15,
        NodeSemantic::Template => 16,
    }
}

/// Tree-shape validation: indices in range and self-consistent, the root has
/// no parent, every other node exactly one, and everything is reachable from
/// the root (which also rules out cycles).
pub(crate) fn validate_tree(nodes: &[LogicNode], root: NodeIndex) -> Result<(), BuildError> {
    if root.as_usize() >= nodes.len() {
        return Err(BuildError::DanglingIndex { index: root });
    }
    for (position, node) in nodes.iter().enumerate() {
        if node.index.as_usize() != position {
            return Err(BuildError::IndexMismatch { index: node.index });
        }
    }

    let mut parent_count = vec![0u32; nodes.len()];
    for node in nodes {
        for child in &node.children {
            if child.as_usize() >= nodes.len() {
                return Err(BuildError::DanglingIndex { index: *child });
            }
            parent_count[child.as_usize()] += 1;
        }
    }
    if parent_count[root.as_usize()] != 0 {
        return Err(BuildError::RootHasParent { index: root });
    }
    for (position, count) in parent_count.iter().enumerate() {
        if position != root.as_usize() && *count != 1 {
            return Err(BuildError::NotATree {
                index: NodeIndex(position as u32),
                parents: *count,
            });
        }
    }

    // Reachability from the root; with single parents this also excludes
    // cycles (a cycle would leave its members unreachable or multi-parented).
    let mut seen = vec![false; nodes.len()];
    let mut stack = vec![root.as_usize()];
    seen[root.as_usize()] = true;
    while let Some(node) = stack.pop() {
        for child in &nodes[node].children {
            if !seen[child.as_usize()] {
                seen[child.as_usize()] = true;
                stack.push(child.as_usize());
            }
        }
    }
    if let Some(position) = seen.iter().position(|s| !s) {
        return Err(BuildError::NotATree {
            index: NodeIndex(position as u32),
            parents: parent_count[position],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::MemoryIdentifierService;
    use crate::logic::builder::ExpressionBuilder;

    use super::*;

    fn simple_expression() -> LogicalExpression {
        let mut b = ExpressionBuilder::new();
        let parent = b.concept(ConceptRef::Nid(Nid(10)));
        let role_value = b.concept(ConceptRef::Nid(Nid(20)));
        let role = b.role_some(ConceptRef::Nid(Nid(30)), role_value);
        let and = b.and(vec![parent, role]);
        b.sufficient_set(and);
        b.build().unwrap()
    }

    #[test]
    fn equality_ignores_connector_child_order() {
        let mut a = ExpressionBuilder::new();
        let x = a.concept(ConceptRef::Nid(Nid(1)));
        let y = a.concept(ConceptRef::Nid(Nid(2)));
        let and = a.and(vec![x, y]);
        a.necessary_set(and);
        let a = a.build().unwrap();

        let mut b = ExpressionBuilder::new();
        let y = b.concept(ConceptRef::Nid(Nid(2)));
        let x = b.concept(ConceptRef::Nid(Nid(1)));
        let and = b.and(vec![y, x]);
        b.necessary_set(and);
        let b = b.build().unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn different_leaves_are_unequal() {
        let mut b = ExpressionBuilder::new();
        let x = b.concept(ConceptRef::Nid(Nid(99)));
        let and = b.and(vec![x]);
        b.necessary_set(and);
        let other = b.build().unwrap();
        assert_ne!(simple_expression(), other);
    }

    #[test]
    fn meaningful_requires_set_content() {
        assert!(simple_expression().is_meaningful());

        let mut b = ExpressionBuilder::new();
        let and = b.and(vec![]);
        b.necessary_set(and);
        let empty = b.build().unwrap();
        assert!(!empty.is_meaningful());
    }

    #[test]
    fn visit_assigns_discovery_order_and_leaves() {
        let e = simple_expression();
        let data = e.visit();
        assert_eq!(data.visited_count(), e.node_count());
        assert_eq!(data.discovery_time(e.root_index().as_usize()), Some(0));
        // Concept leaves plus none else.
        assert_eq!(data.leaves().len(), 2);
        assert!(data.cycles().is_empty());
    }

    #[test]
    fn isa_targets_come_from_set_connectors() {
        let e = simple_expression();
        // Nid(10) is asserted is-a; Nid(20) sits under a role restriction.
        assert_eq!(e.isa_target_nids(), vec![Nid(10)]);
    }

    #[test]
    fn target_conversion_round_trips() {
        let ids = MemoryIdentifierService::new();
        let u10 = uuid::Uuid::new_v4();
        let u20 = uuid::Uuid::new_v4();
        let u30 = uuid::Uuid::new_v4();
        assert_eq!(ids.nid_for_uuid(u10), Nid(1));
        assert_eq!(ids.nid_for_uuid(u20), Nid(2));
        assert_eq!(ids.nid_for_uuid(u30), Nid(3));

        let mut b = ExpressionBuilder::new();
        let parent = b.concept(ConceptRef::Nid(Nid(1)));
        let value = b.concept(ConceptRef::Nid(Nid(2)));
        let role = b.role_some(ConceptRef::Nid(Nid(3)), value);
        let and = b.and(vec![parent, role]);
        b.sufficient_set(and);
        let internal = b.build().unwrap();

        let external = internal.to_external(&ids).unwrap();
        assert_eq!(external.target(), DataTarget::External);
        let round = external.to_internal(&ids).unwrap();
        assert_eq!(round, internal);
        assert_eq!(round.to_external(&ids).unwrap(), external);
    }

    #[test]
    fn unresolvable_nid_fails_conversion() {
        let ids = MemoryIdentifierService::new();
        let e = simple_expression();
        assert!(e.to_external(&ids).is_err());
    }
}
