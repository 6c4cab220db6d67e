//! Versions and their payloads.
//!
//! One tagged union over every semantic payload kind; "distance" and
//! "equals" are single exhaustive matches rather than virtual dispatch.

use serde::{Deserialize, Serialize};

use crate::logic::LogicalExpression;

use super::identity::Nid;
use super::stamp::StampKey;

/// Semantic-type-specific version payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionPayload {
    /// Concept versions carry only their stamp.
    Concept,
    /// Membership in the enclosing assemblage, no fields.
    Membership,
    Description {
        text: String,
        language: Nid,
        case_significance: Nid,
        description_type: Nid,
    },
    ComponentRef {
        component: Nid,
    },
    LongSemantic(i64),
    StringSemantic(String),
    Image(#[serde(with = "serde_bytes_vec")] Vec<u8>),
    LogicGraph(LogicalExpression),
}

mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Vec::<u8>::deserialize(d)
    }
}

impl VersionPayload {
    /// Structural equality across payloads.
    pub fn deep_equals(&self, other: &VersionPayload) -> bool {
        self == other
    }

    /// Field-count edit distance between two payloads.
    ///
    /// Payloads of different kinds are maximally distant.
    pub fn edit_distance(&self, other: &VersionPayload) -> u32 {
        use VersionPayload::*;
        match (self, other) {
            (Concept, Concept) | (Membership, Membership) => 0,
            (
                Description {
                    text: t1,
                    language: l1,
                    case_significance: c1,
                    description_type: d1,
                },
                Description {
                    text: t2,
                    language: l2,
                    case_significance: c2,
                    description_type: d2,
                },
            ) => {
                u32::from(t1 != t2)
                    + u32::from(l1 != l2)
                    + u32::from(c1 != c2)
                    + u32::from(d1 != d2)
            }
            (ComponentRef { component: a }, ComponentRef { component: b }) => u32::from(a != b),
            (LongSemantic(a), LongSemantic(b)) => u32::from(a != b),
            (StringSemantic(a), StringSemantic(b)) => u32::from(a != b),
            (Image(a), Image(b)) => u32::from(a != b),
            (LogicGraph(a), LogicGraph(b)) => u32::from(a != b),
            _ => u32::MAX,
        }
    }
}

/// One immutable version: an interned stamp key plus a payload.
///
/// "Editing" a committed version creates an analog with a new stamp; the
/// chronicle's version list only ever grows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    stamp: StampKey,
    payload: VersionPayload,
}

impl Version {
    pub fn new(stamp: StampKey, payload: VersionPayload) -> Self {
        Self { stamp, payload }
    }

    pub fn stamp(&self) -> StampKey {
        self.stamp
    }

    pub fn payload(&self) -> &VersionPayload {
        &self.payload
    }

    pub(crate) fn set_stamp(&mut self, stamp: StampKey) {
        self.stamp = stamp;
    }

    pub(crate) fn set_payload(&mut self, payload: VersionPayload) {
        self.payload = payload;
    }
}
