//! Core domain types.
//!
//! Module hierarchy follows type dependency order:
//! - identity: Nid, ComponentId, the identifier boundary
//! - status / time: stamp field atoms
//! - stamp: Stamp, StampKey, StampService (interning + path origins)
//! - coordinate: StampFilter, StampCoordinate, ManifoldCoordinate
//! - version: VersionPayload union, Version
//! - chronology: append-only histories + STAMP resolution
//! - store: nid-keyed chronicle map with derived indexes

pub mod chronology;
pub mod coordinate;
pub mod error;
pub mod identity;
pub mod stamp;
pub mod status;
pub mod store;
pub mod time;
pub mod version;

pub use chronology::{Chronology, LatestVersion};
pub use coordinate::{
    LanguageCoordinate, ManifoldCoordinate, Precedence, PremiseType, StampCoordinate, StampFilter,
};
pub use error::{CoreError, StoreError, VersionError};
pub use identity::{ComponentId, IdentifierService, MemoryIdentifierService, Nid};
pub use stamp::{PathOrigin, Stamp, StampKey, StampService};
pub use status::Status;
pub use store::ChronologyStore;
pub use time::VersionTime;
pub use version::{Version, VersionPayload};
