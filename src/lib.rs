#![forbid(unsafe_code)]

//! Versioned knowledge-representation core.
//!
//! Three pillars:
//! - bitemporal chronicles: every component carries an append-only version
//!   history, each version stamped with (status, time, author, module,
//!   path), resolved against a coordinate that may report a contradiction
//!   instead of a single latest version;
//! - logic graphs: description-logic definitions as canonical expression
//!   trees, with an isomorphism engine that diffs two definitions of the
//!   same concept;
//! - taxonomy snapshots: cycle-tolerant parent/child views computed from
//!   chronicle data at a fixed coordinate, composable into amalgams.

pub mod classify;
pub mod config;
pub mod core;
pub mod error;
pub mod logic;
pub mod taxonomy;
pub mod telemetry;
pub mod tree;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the working set at crate root for convenience
pub use crate::core::{
    Chronology, ChronologyStore, ComponentId, IdentifierService, LatestVersion,
    ManifoldCoordinate, MemoryIdentifierService, Nid, Precedence, PremiseType, Stamp,
    StampCoordinate, StampFilter, StampKey, StampService, Status, Version, VersionPayload,
    VersionTime,
};
pub use crate::logic::{
    find_isomorphisms, ExpressionBuilder, IsomorphicResults, LogicalExpression,
};
pub use crate::taxonomy::{TaxonomyAmalgam, TaxonomySnapshot};
