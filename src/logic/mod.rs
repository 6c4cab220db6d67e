//! Definitional logic: expression trees, construction, serialization, and
//! the isomorphism engine that compares two definitions of one concept.

pub mod builder;
pub mod expression;
pub mod isomorphic;
pub mod node;
pub mod wire;

pub use builder::{BuildError, ExpressionBuilder};
pub use expression::{DataTarget, LogicalExpression};
pub use isomorphic::{find_isomorphisms, IsomorphicResults, IsomorphicSolution};
pub use node::{
    ConcreteOperator, ConceptRef, FloatLiteral, LogicNode, NodeIndex, NodeKind, NodeSemantic,
    SubstitutionKind,
};
pub use wire::{decode, encode, WireError};
