//! Logic-graph nodes.
//!
//! One tagged union over every node kind; children are expression-local
//! array indices, never pointers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Nid;

/// Index of a node within one expression's node array.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeIndex({})", self.0)
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component reference inside a node: dense integer id (internal target) or
/// UUID (external/interchange target).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptRef {
    Nid(Nid),
    Uuid(Uuid),
}

impl ConceptRef {
    pub fn nid(self) -> Option<Nid> {
        match self {
            ConceptRef::Nid(nid) => Some(nid),
            ConceptRef::Uuid(_) => None,
        }
    }
}

/// Concrete-domain comparison operator for feature assertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcreteOperator {
    Equals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Value kind of a template substitution placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionKind {
    Boolean,
    Float,
    Instant,
    Integer,
    String,
    Concept,
}

/// `f64` stored by bit pattern so literal nodes stay `Eq`/`Hash`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FloatLiteral(u64);

impl FloatLiteral {
    pub fn from_f64(value: f64) -> Self {
        Self(value.to_bits())
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for FloatLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FloatLiteral({})", self.value())
    }
}

impl Serialize for FloatLiteral {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for FloatLiteral {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok(FloatLiteral::from_f64(value))
    }
}

/// Node payload union. Children live on [`LogicNode`], not here, so kind
/// equality is exactly "matches ignoring children".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// The designated expression root; its children are the definition sets.
    Root,
    NecessarySet,
    SufficientSet,
    And,
    Or,
    DisjointWith,
    /// Existential role restriction: ∃ role_type . child.
    RoleSome { role_type: ConceptRef },
    /// Universal role restriction: ∀ role_type . child.
    RoleAll { role_type: ConceptRef },
    Concept { concept: ConceptRef },
    /// Concrete-domain assertion; the measured value is the single child.
    Feature {
        feature_type: ConceptRef,
        operator: ConcreteOperator,
    },
    LiteralBoolean { value: bool },
    LiteralFloat { value: FloatLiteral },
    LiteralInstant { epoch_millis: i64 },
    LiteralInteger { value: i64 },
    LiteralString { value: String },
    /// Template placeholder, filled at instantiation time.
    Substitution {
        value_kind: SubstitutionKind,
        field: String,
    },
    Template {
        template: ConceptRef,
        assemblage: ConceptRef,
    },
}

/// Fieldless discriminant used for candidate pruning and the wire tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSemantic {
    Root,
    NecessarySet,
    SufficientSet,
    And,
    Or,
    DisjointWith,
    RoleSome,
    RoleAll,
    Concept,
    Feature,
    LiteralBoolean,
    LiteralFloat,
    LiteralInstant,
    LiteralInteger,
    LiteralString,
    Substitution,
    Template,
}

impl NodeSemantic {
    pub fn is_connector(self) -> bool {
        matches!(self, NodeSemantic::And | NodeSemantic::Or)
    }

    pub fn is_definition_set(self) -> bool {
        matches!(self, NodeSemantic::NecessarySet | NodeSemantic::SufficientSet)
    }

    /// Child order carries no meaning for these kinds.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            NodeSemantic::Root
                | NodeSemantic::NecessarySet
                | NodeSemantic::SufficientSet
                | NodeSemantic::And
                | NodeSemantic::Or
                | NodeSemantic::DisjointWith
        )
    }
}

impl NodeKind {
    pub fn semantic(&self) -> NodeSemantic {
        match self {
            NodeKind::Root => NodeSemantic::Root,
            NodeKind::NecessarySet => NodeSemantic::NecessarySet,
            NodeKind::SufficientSet => NodeSemantic::SufficientSet,
            NodeKind::And => NodeSemantic::And,
            NodeKind::Or => NodeSemantic::Or,
            NodeKind::DisjointWith => NodeSemantic::DisjointWith,
            NodeKind::RoleSome { .. } => NodeSemantic::RoleSome,
            NodeKind::RoleAll { .. } => NodeSemantic::RoleAll,
            NodeKind::Concept { .. } => NodeSemantic::Concept,
            NodeKind::Feature { .. } => NodeSemantic::Feature,
            NodeKind::LiteralBoolean { .. } => NodeSemantic::LiteralBoolean,
            NodeKind::LiteralFloat { .. } => NodeSemantic::LiteralFloat,
            NodeKind::LiteralInstant { .. } => NodeSemantic::LiteralInstant,
            NodeKind::LiteralInteger { .. } => NodeSemantic::LiteralInteger,
            NodeKind::LiteralString { .. } => NodeSemantic::LiteralString,
            NodeKind::Substitution { .. } => NodeSemantic::Substitution,
            NodeKind::Template { .. } => NodeSemantic::Template,
        }
    }

    /// Component references carried by this kind, in a fixed order.
    pub fn refs(&self) -> Vec<ConceptRef> {
        match self {
            NodeKind::RoleSome { role_type } | NodeKind::RoleAll { role_type } => vec![*role_type],
            NodeKind::Concept { concept } => vec![*concept],
            NodeKind::Feature { feature_type, .. } => vec![*feature_type],
            NodeKind::Template {
                template,
                assemblage,
            } => vec![*template, *assemblage],
            _ => Vec::new(),
        }
    }

    /// Rewrite this kind's component references through `f`.
    pub fn map_refs<E>(
        &self,
        mut f: impl FnMut(ConceptRef) -> Result<ConceptRef, E>,
    ) -> Result<NodeKind, E> {
        Ok(match self {
            NodeKind::RoleSome { role_type } => NodeKind::RoleSome {
                role_type: f(*role_type)?,
            },
            NodeKind::RoleAll { role_type } => NodeKind::RoleAll {
                role_type: f(*role_type)?,
            },
            NodeKind::Concept { concept } => NodeKind::Concept {
                concept: f(*concept)?,
            },
            NodeKind::Feature {
                feature_type,
                operator,
            } => NodeKind::Feature {
                feature_type: f(*feature_type)?,
                operator: *operator,
            },
            NodeKind::Template {
                template,
                assemblage,
            } => NodeKind::Template {
                template: f(*template)?,
                assemblage: f(*assemblage)?,
            },
            other => other.clone(),
        })
    }
}

/// One node: stable index, child indices, payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicNode {
    pub index: NodeIndex,
    pub children: Vec<NodeIndex>,
    pub kind: NodeKind,
}

impl LogicNode {
    pub fn new(index: NodeIndex, children: Vec<NodeIndex>, kind: NodeKind) -> Self {
        Self {
            index,
            children,
            kind,
        }
    }

    pub fn semantic(&self) -> NodeSemantic {
        self.kind.semantic()
    }

    /// Candidate compatibility for isomorphism: identical payload, children
    /// disregarded.
    pub fn matches_ignoring_children(&self, other: &LogicNode) -> bool {
        self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_literal_equality_is_bitwise() {
        let a = FloatLiteral::from_f64(0.1);
        let b = FloatLiteral::from_f64(0.1);
        assert_eq!(a, b);
        assert_eq!(a.value(), 0.1);
    }

    #[test]
    fn semantic_tracks_kind() {
        let kind = NodeKind::RoleSome {
            role_type: ConceptRef::Nid(Nid(5)),
        };
        assert_eq!(kind.semantic(), NodeSemantic::RoleSome);
        assert!(NodeSemantic::And.is_connector());
        assert!(NodeSemantic::SufficientSet.is_definition_set());
        assert!(!NodeSemantic::RoleSome.is_commutative());
    }

    #[test]
    fn matching_ignores_children() {
        let a = LogicNode::new(
            NodeIndex(0),
            vec![NodeIndex(1)],
            NodeKind::Concept {
                concept: ConceptRef::Nid(Nid(3)),
            },
        );
        let b = LogicNode::new(
            NodeIndex(5),
            vec![],
            NodeKind::Concept {
                concept: ConceptRef::Nid(Nid(3)),
            },
        );
        assert!(a.matches_ignoring_children(&b));
    }
}
