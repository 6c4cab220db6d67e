//! Serialized logical-expression wire format.
//!
//! `i32 node_count`, then `node_count` length-prefixed opaque node records.
//! Internal and external targets differ only in how component references are
//! encoded inside the records: dense integer id vs UUID. Decode re-validates
//! the tree invariant before handing an expression back.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use uuid::Uuid;

use crate::core::Nid;
use crate::error::{Effect, Transience};

use super::builder::BuildError;
use super::expression::{semantic_tag, DataTarget, LogicalExpression};
use super::node::{
    ConcreteOperator, ConceptRef, FloatLiteral, LogicNode, NodeIndex, NodeKind, SubstitutionKind,
};

/// Wire decode failures.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum WireError {
    #[error("record truncated while reading {context}")]
    Truncated { context: &'static str },
    #[error("unknown node tag {tag}")]
    UnknownTag { tag: u8 },
    #[error("unknown reference encoding {marker}")]
    UnknownRefMarker { marker: u8 },
    #[error("unknown operator encoding {value}")]
    UnknownOperator { value: u8 },
    #[error("unknown substitution kind {value}")]
    UnknownSubstitutionKind { value: u8 },
    #[error("node record carries invalid utf-8")]
    InvalidUtf8,
    #[error("negative or oversized count {count}")]
    BadCount { count: i64 },
    #[error("expression has no root record")]
    RootMissing,
    #[error("expression has {count} root records; exactly one expected")]
    MultipleRoots { count: usize },
    #[error("reference encoding does not match requested target")]
    TargetMismatch,
    #[error("decoded records do not form a tree: {source}")]
    Shape {
        #[from]
        source: BuildError,
    },
}

impl WireError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Serialize an expression to its wire form. The reference encoding follows
/// the expression's target.
pub fn encode(expression: &LogicalExpression) -> Bytes {
    let mut out = BytesMut::new();
    out.put_i32(expression.node_count() as i32);
    for node in expression.nodes() {
        let record = encode_node(node);
        out.put_u32(record.len() as u32);
        out.put_slice(&record);
    }
    out.freeze()
}

/// Deserialize an expression, checking references against `target`.
pub fn decode(mut buf: impl Buf, target: DataTarget) -> Result<LogicalExpression, WireError> {
    if buf.remaining() < 4 {
        return Err(WireError::Truncated {
            context: "node count",
        });
    }
    let count = buf.get_i32();
    if count < 0 || count as usize > MAX_NODES {
        return Err(WireError::BadCount {
            count: i64::from(count),
        });
    }

    let mut nodes = Vec::with_capacity(count as usize);
    for position in 0..count as usize {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated {
                context: "record length",
            });
        }
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(WireError::Truncated {
                context: "node record",
            });
        }
        let mut record = buf.copy_to_bytes(len);
        nodes.push(decode_node(&mut record, NodeIndex(position as u32), target)?);
    }

    let roots: Vec<NodeIndex> = nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Root))
        .map(|n| n.index)
        .collect();
    let root = match roots.as_slice() {
        [] => return Err(WireError::RootMissing),
        [single] => *single,
        many => {
            return Err(WireError::MultipleRoots { count: many.len() });
        }
    };
    Ok(LogicalExpression::from_parts(nodes, root, None, target)?)
}

/// Guard against hostile counts; real definitions are far smaller.
const MAX_NODES: usize = 1 << 20;

const REF_NID: u8 = 0;
const REF_UUID: u8 = 1;

fn encode_node(node: &LogicNode) -> Vec<u8> {
    let mut out = vec![semantic_tag(node.semantic())];
    out.extend_from_slice(&(node.children.len() as u32).to_be_bytes());
    for child in &node.children {
        out.extend_from_slice(&child.0.to_be_bytes());
    }
    match &node.kind {
        NodeKind::Root
        | NodeKind::NecessarySet
        | NodeKind::SufficientSet
        | NodeKind::And
        | NodeKind::Or
        | NodeKind::DisjointWith => {}
        NodeKind::RoleSome { role_type } | NodeKind::RoleAll { role_type } => {
            put_ref(&mut out, *role_type);
        }
        NodeKind::Concept { concept } => put_ref(&mut out, *concept),
        NodeKind::Feature {
            feature_type,
            operator,
        } => {
            put_ref(&mut out, *feature_type);
            out.push(*operator as u8);
        }
        NodeKind::LiteralBoolean { value } => out.push(u8::from(*value)),
        NodeKind::LiteralFloat { value } => out.extend_from_slice(&value.to_bits().to_be_bytes()),
        NodeKind::LiteralInstant { epoch_millis } => {
            out.extend_from_slice(&epoch_millis.to_be_bytes());
        }
        NodeKind::LiteralInteger { value } => out.extend_from_slice(&value.to_be_bytes()),
        NodeKind::LiteralString { value } => put_string(&mut out, value),
        NodeKind::Substitution { value_kind, field } => {
            out.push(*value_kind as u8);
            put_string(&mut out, field);
        }
        NodeKind::Template {
            template,
            assemblage,
        } => {
            put_ref(&mut out, *template);
            put_ref(&mut out, *assemblage);
        }
    }
    out
}

fn put_ref(out: &mut Vec<u8>, r: ConceptRef) {
    match r {
        ConceptRef::Nid(nid) => {
            out.push(REF_NID);
            out.extend_from_slice(&nid.value().to_be_bytes());
        }
        ConceptRef::Uuid(uuid) => {
            out.push(REF_UUID);
            out.extend_from_slice(uuid.as_bytes());
        }
    }
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn decode_node(
    buf: &mut Bytes,
    index: NodeIndex,
    target: DataTarget,
) -> Result<LogicNode, WireError> {
    let tag = get_u8(buf, "node tag")?;
    let child_count = get_u32(buf, "child count")? as usize;
    if child_count > MAX_NODES {
        return Err(WireError::BadCount {
            count: child_count as i64,
        });
    }
    let mut children = Vec::with_capacity(child_count);
    for _ in 0..child_count {
        children.push(NodeIndex(get_u32(buf, "child index")?));
    }

    let kind = match tag {
        0 => NodeKind::Root,
        1 => NodeKind::NecessarySet,
        2 => NodeKind::SufficientSet,
        3 => NodeKind::And,
        4 => NodeKind::Or,
        5 => NodeKind::DisjointWith,
        6 => NodeKind::RoleSome {
            role_type: get_ref(buf, target)?,
        },
        7 => NodeKind::RoleAll {
            role_type: get_ref(buf, target)?,
        },
        8 => NodeKind::Concept {
            concept: get_ref(buf, target)?,
        },
        9 => NodeKind::Feature {
            feature_type: get_ref(buf, target)?,
            operator: decode_operator(get_u8(buf, "operator")?)?,
        },
        10 => NodeKind::LiteralBoolean {
            value: get_u8(buf, "boolean literal")? != 0,
        },
        11 => NodeKind::LiteralFloat {
            value: FloatLiteral::from_bits(get_u64(buf, "float literal")?),
        },
        12 => NodeKind::LiteralInstant {
            epoch_millis: get_i64(buf, "instant literal")?,
        },
        13 => NodeKind::LiteralInteger {
            value: get_i64(buf, "integer literal")?,
        },
        14 => NodeKind::LiteralString {
            value: get_string(buf)?,
        },
        15 => NodeKind::Substitution {
            value_kind: decode_substitution_kind(get_u8(buf, "substitution kind")?)?,
            field: get_string(buf)?,
        },
        16 => NodeKind::Template {
            template: get_ref(buf, target)?,
            assemblage: get_ref(buf, target)?,
        },
        tag => return Err(WireError::UnknownTag { tag }),
    };
    Ok(LogicNode::new(index, children, kind))
}

fn decode_operator(value: u8) -> Result<ConcreteOperator, WireError> {
    Ok(match value {
        0 => ConcreteOperator::Equals,
        1 => ConcreteOperator::LessThan,
        2 => ConcreteOperator::LessThanOrEqual,
        3 => ConcreteOperator::GreaterThan,
        4 => ConcreteOperator::GreaterThanOrEqual,
        value => return Err(WireError::UnknownOperator { value }),
    })
}

fn decode_substitution_kind(value: u8) -> Result<SubstitutionKind, WireError> {
    Ok(match value {
        0 => SubstitutionKind::Boolean,
        1 => SubstitutionKind::Float,
        2 => SubstitutionKind::Instant,
        3 => SubstitutionKind::Integer,
        4 => SubstitutionKind::String,
        5 => SubstitutionKind::Concept,
        value => return Err(WireError::UnknownSubstitutionKind { value }),
    })
}

fn get_ref(buf: &mut Bytes, target: DataTarget) -> Result<ConceptRef, WireError> {
    let marker = get_u8(buf, "reference marker")?;
    match (marker, target) {
        (REF_NID, DataTarget::Internal) => {
            if buf.remaining() < 4 {
                return Err(WireError::Truncated {
                    context: "nid reference",
                });
            }
            Ok(ConceptRef::Nid(Nid(buf.get_i32())))
        }
        (REF_UUID, DataTarget::External) => {
            if buf.remaining() < 16 {
                return Err(WireError::Truncated {
                    context: "uuid reference",
                });
            }
            let mut raw = [0u8; 16];
            buf.copy_to_slice(&mut raw);
            Ok(ConceptRef::Uuid(Uuid::from_bytes(raw)))
        }
        (REF_NID, DataTarget::External) | (REF_UUID, DataTarget::Internal) => {
            Err(WireError::TargetMismatch)
        }
        (marker, _) => Err(WireError::UnknownRefMarker { marker }),
    }
}

fn get_u8(buf: &mut Bytes, context: &'static str) -> Result<u8, WireError> {
    if buf.remaining() < 1 {
        return Err(WireError::Truncated { context });
    }
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut Bytes, context: &'static str) -> Result<u32, WireError> {
    if buf.remaining() < 4 {
        return Err(WireError::Truncated { context });
    }
    Ok(buf.get_u32())
}

fn get_u64(buf: &mut Bytes, context: &'static str) -> Result<u64, WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::Truncated { context });
    }
    Ok(buf.get_u64())
}

fn get_i64(buf: &mut Bytes, context: &'static str) -> Result<i64, WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::Truncated { context });
    }
    Ok(buf.get_i64())
}

fn get_string(buf: &mut Bytes) -> Result<String, WireError> {
    let len = get_u32(buf, "string length")? as usize;
    if buf.remaining() < len {
        return Err(WireError::Truncated {
            context: "string payload",
        });
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use crate::core::{IdentifierService, MemoryIdentifierService};
    use crate::logic::builder::ExpressionBuilder;

    use super::*;

    fn fixture() -> LogicalExpression {
        let mut b = ExpressionBuilder::new();
        let parent = b.concept(ConceptRef::Nid(Nid(1)));
        let measure = b.float_literal(2.5);
        let feature = b.feature(ConceptRef::Nid(Nid(2)), ConcreteOperator::LessThan, measure);
        let value = b.string_literal("severity");
        let sub = b.substitution(SubstitutionKind::Concept, "finding-site");
        let and = b.and(vec![parent, feature, value, sub]);
        b.sufficient_set(and);
        let or_leaf = b.boolean_literal(true);
        let or = b.or(vec![or_leaf]);
        b.necessary_set(or);
        b.build().unwrap()
    }

    #[test]
    fn internal_round_trip_is_exact() {
        let mut b = ExpressionBuilder::new();
        let parent = b.concept(ConceptRef::Nid(Nid(1)));
        let measure = b.integer_literal(14);
        let feature = b.feature(ConceptRef::Nid(Nid(2)), ConcreteOperator::Equals, measure);
        let and = b.and(vec![parent, feature]);
        b.sufficient_set(and);
        let expression = b.build().unwrap();

        let bytes = encode(&expression);
        let decoded = decode(bytes, DataTarget::Internal).unwrap();
        assert_eq!(decoded, expression);
        assert_eq!(decoded.node_count(), expression.node_count());
    }

    #[test]
    fn external_round_trip_is_exact() {
        let ids = MemoryIdentifierService::new();
        let a = ids.nid_for_uuid(uuid::Uuid::new_v4());
        let mut b = ExpressionBuilder::new();
        let parent = b.concept(ConceptRef::Nid(a));
        let and = b.and(vec![parent]);
        b.sufficient_set(and);
        let internal = b.build().unwrap();

        let external = internal.to_external(&ids).unwrap();
        let bytes = encode(&external);
        let decoded = decode(bytes, DataTarget::External).unwrap();
        assert_eq!(decoded, external);
        assert_eq!(decoded.to_internal(&ids).unwrap(), internal);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let expression = fixture();
        let bytes = encode(&expression);
        let truncated = bytes.slice(0..bytes.len() - 3);
        assert!(matches!(
            decode(truncated, DataTarget::Internal),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn target_mismatch_is_rejected() {
        let expression = fixture();
        let bytes = encode(&expression);
        assert!(matches!(
            decode(bytes, DataTarget::External),
            Err(WireError::TargetMismatch)
        ));
    }

    #[test]
    fn missing_root_is_rejected() {
        let mut out = bytes::BytesMut::new();
        out.put_i32(1);
        let record = vec![3u8, 0, 0, 0, 0]; // And node, no children
        out.put_u32(record.len() as u32);
        out.put_slice(&record);
        assert!(matches!(
            decode(out.freeze(), DataTarget::Internal),
            Err(WireError::RootMissing)
        ));
    }
}
