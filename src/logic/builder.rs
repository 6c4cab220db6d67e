//! Expression construction.
//!
//! One builder context accumulates node records and validates on `build()`;
//! incomplete construction fails before any serialization is attempted.

use thiserror::Error;

use crate::core::Nid;
use crate::error::{Effect, Transience};

use super::expression::{validate_tree, DataTarget, LogicalExpression};
use super::node::{
    ConcreteOperator, ConceptRef, FloatLiteral, LogicNode, NodeIndex, NodeKind, NodeSemantic,
    SubstitutionKind,
};

/// Incomplete or ill-formed expression construction.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum BuildError {
    #[error("expression has no definition sets")]
    NoDefinitionSets,
    #[error("definition set {index} requires a single And/Or connector child, found {found:?}")]
    SetRequiresConnector {
        index: NodeIndex,
        found: NodeSemantic,
    },
    #[error("node index {index} is out of range")]
    DanglingIndex { index: NodeIndex },
    #[error("node at position {index} carries a different index")]
    IndexMismatch { index: NodeIndex },
    #[error("root node {index} must not have a parent")]
    RootHasParent { index: NodeIndex },
    #[error("node {index} has {parents} parents; expressions are trees")]
    NotATree { index: NodeIndex, parents: u32 },
}

impl BuildError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Accumulates node records; `build()` assembles the root and validates.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    nodes: Vec<LogicNode>,
    sets: Vec<NodeIndex>,
    concept_nid: Option<Nid>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concept this expression will define.
    pub fn for_concept(mut self, nid: Nid) -> Self {
        self.concept_nid = Some(nid);
        self
    }

    fn push(&mut self, kind: NodeKind, children: Vec<NodeIndex>) -> NodeIndex {
        let index = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(LogicNode::new(index, children, kind));
        index
    }

    pub fn concept(&mut self, concept: ConceptRef) -> NodeIndex {
        self.push(NodeKind::Concept { concept }, Vec::new())
    }

    pub fn and(&mut self, elements: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::And, elements)
    }

    pub fn or(&mut self, elements: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Or, elements)
    }

    pub fn disjoint_with(&mut self, elements: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::DisjointWith, elements)
    }

    pub fn role_some(&mut self, role_type: ConceptRef, restriction: NodeIndex) -> NodeIndex {
        self.push(NodeKind::RoleSome { role_type }, vec![restriction])
    }

    pub fn role_all(&mut self, role_type: ConceptRef, restriction: NodeIndex) -> NodeIndex {
        self.push(NodeKind::RoleAll { role_type }, vec![restriction])
    }

    pub fn feature(
        &mut self,
        feature_type: ConceptRef,
        operator: ConcreteOperator,
        measure: NodeIndex,
    ) -> NodeIndex {
        self.push(
            NodeKind::Feature {
                feature_type,
                operator,
            },
            vec![measure],
        )
    }

    pub fn boolean_literal(&mut self, value: bool) -> NodeIndex {
        self.push(NodeKind::LiteralBoolean { value }, Vec::new())
    }

    pub fn float_literal(&mut self, value: f64) -> NodeIndex {
        self.push(
            NodeKind::LiteralFloat {
                value: FloatLiteral::from_f64(value),
            },
            Vec::new(),
        )
    }

    pub fn instant_literal(&mut self, epoch_millis: i64) -> NodeIndex {
        self.push(NodeKind::LiteralInstant { epoch_millis }, Vec::new())
    }

    pub fn integer_literal(&mut self, value: i64) -> NodeIndex {
        self.push(NodeKind::LiteralInteger { value }, Vec::new())
    }

    pub fn string_literal(&mut self, value: impl Into<String>) -> NodeIndex {
        self.push(
            NodeKind::LiteralString {
                value: value.into(),
            },
            Vec::new(),
        )
    }

    pub fn substitution(&mut self, value_kind: SubstitutionKind, field: impl Into<String>) -> NodeIndex {
        self.push(
            NodeKind::Substitution {
                value_kind,
                field: field.into(),
            },
            Vec::new(),
        )
    }

    pub fn template(&mut self, template: ConceptRef, assemblage: ConceptRef) -> NodeIndex {
        self.push(
            NodeKind::Template {
                template,
                assemblage,
            },
            Vec::new(),
        )
    }

    /// Add a necessary (but not sufficient) definition set over `connector`.
    pub fn necessary_set(&mut self, connector: NodeIndex) -> NodeIndex {
        let set = self.push(NodeKind::NecessarySet, vec![connector]);
        self.sets.push(set);
        set
    }

    /// Add a sufficient (defining) set over `connector`.
    pub fn sufficient_set(&mut self, connector: NodeIndex) -> NodeIndex {
        let set = self.push(NodeKind::SufficientSet, vec![connector]);
        self.sets.push(set);
        set
    }

    /// Assemble the root and validate the whole tree.
    pub fn build(mut self) -> Result<LogicalExpression, BuildError> {
        if self.sets.is_empty() {
            return Err(BuildError::NoDefinitionSets);
        }
        for set in &self.sets {
            let connector = self.nodes[set.as_usize()]
                .children
                .first()
                .copied()
                .ok_or(BuildError::SetRequiresConnector {
                    index: *set,
                    found: NodeSemantic::NecessarySet,
                })?;
            let found = self
                .nodes
                .get(connector.as_usize())
                .ok_or(BuildError::DanglingIndex { index: connector })?
                .semantic();
            if !found.is_connector() {
                return Err(BuildError::SetRequiresConnector { index: *set, found });
            }
        }

        let sets = std::mem::take(&mut self.sets);
        let root = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(LogicNode::new(root, sets, NodeKind::Root));
        validate_tree(&self.nodes, root)?;
        Ok(LogicalExpression::from_parts_unchecked(
            self.nodes,
            root,
            self.concept_nid,
            DataTarget::Internal,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_builder_fails() {
        let b = ExpressionBuilder::new();
        assert!(matches!(b.build(), Err(BuildError::NoDefinitionSets)));
    }

    #[test]
    fn set_over_non_connector_fails() {
        let mut b = ExpressionBuilder::new();
        let leaf = b.concept(ConceptRef::Nid(Nid(1)));
        b.necessary_set(leaf);
        assert!(matches!(
            b.build(),
            Err(BuildError::SetRequiresConnector { .. })
        ));
    }

    #[test]
    fn shared_child_fails() {
        let mut b = ExpressionBuilder::new();
        let leaf = b.concept(ConceptRef::Nid(Nid(1)));
        let and = b.and(vec![leaf]);
        let or = b.or(vec![leaf]);
        b.necessary_set(and);
        b.sufficient_set(or);
        assert!(matches!(b.build(), Err(BuildError::NotATree { .. })));
    }

    #[test]
    fn valid_build_assigns_root_and_indices() {
        let mut b = ExpressionBuilder::new().for_concept(Nid(42));
        let leaf = b.concept(ConceptRef::Nid(Nid(1)));
        let and = b.and(vec![leaf]);
        b.sufficient_set(and);
        let e = b.build().unwrap();

        assert_eq!(e.node_count(), 4);
        assert_eq!(e.concept_nid(), Some(Nid(42)));
        assert_eq!(e.root_node().semantic(), NodeSemantic::Root);
        for (position, node) in e.nodes().iter().enumerate() {
            assert_eq!(node.index.as_usize(), position);
        }
    }

    #[test]
    fn feature_holds_measure_child() {
        let mut b = ExpressionBuilder::new();
        let measure = b.float_literal(37.2);
        let feature = b.feature(
            ConceptRef::Nid(Nid(9)),
            ConcreteOperator::GreaterThan,
            measure,
        );
        let and = b.and(vec![feature]);
        b.necessary_set(and);
        let e = b.build().unwrap();
        assert!(e.is_meaningful());
        assert_eq!(e.children_of(feature).len(), 1);
    }
}
