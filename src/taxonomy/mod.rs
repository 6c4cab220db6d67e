//! Taxonomy snapshots: queryable parent/child views derived from semantic
//! graph data at a fixed coordinate, plus traversal over them.
//!
//! Upstream data may legitimately be malformed (cycles in supposedly-acyclic
//! is-a graphs), so every walk here carries a visited or processing set and
//! reports cycles instead of recursing into them.

use thiserror::Error;

use crate::core::Nid;
use crate::error::{Effect, Transience};

pub mod amalgam;
pub mod snapshot;
pub mod tree;

pub use amalgam::TaxonomyAmalgam;
pub use snapshot::{
    GraphTaxonomySnapshot, PathOriginSnapshot, SnapshotCache, TaxonomySnapshot,
};
pub use tree::Tree;

/// One directed taxonomy edge to `destination`, typed by the assemblage the
/// relationship came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TaxonomyLink {
    pub type_nid: Nid,
    pub destination: Nid,
}

impl TaxonomyLink {
    pub fn new(type_nid: Nid, destination: Nid) -> Self {
        Self {
            type_nid,
            destination,
        }
    }
}

/// Taxonomy composition and query failures.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum TaxonomyError {
    /// A transitive-closure query was issued against an amalgam with no
    /// defining source configured.
    #[error("query requires a defining taxonomy source and none is configured")]
    UnsupportedComposition,
}

impl TaxonomyError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
