//! View coordinates.
//!
//! Immutable value objects describing which versions are visible and how
//! ties are broken. A coordinate never mutates; deriving a variant clones.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::identity::Nid;
use super::status::Status;
use super::time::VersionTime;

/// How competing versions are ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Versions on the coordinate's path (and its origins, nearest first)
    /// shadow versions on other paths.
    Path,
    /// Greatest time wins regardless of path.
    Time,
}

/// Which definitional premise a view consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiseType {
    Stated,
    Inferred,
}

/// Status/module/time constraints on version visibility.
///
/// An empty module set admits every module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampFilter {
    pub allowed_states: BTreeSet<Status>,
    pub time: VersionTime,
    pub modules: BTreeSet<Nid>,
}

impl StampFilter {
    pub fn new(allowed_states: BTreeSet<Status>, time: VersionTime, modules: BTreeSet<Nid>) -> Self {
        Self {
            allowed_states,
            time,
            modules,
        }
    }

    /// Active-only, any module, latest time (uncommitted included).
    pub fn active_latest() -> Self {
        Self {
            allowed_states: BTreeSet::from([Status::Active]),
            time: VersionTime::LATEST,
            modules: BTreeSet::new(),
        }
    }

    /// Active and inactive, any module, latest time.
    pub fn active_and_inactive_latest() -> Self {
        Self {
            allowed_states: BTreeSet::from([Status::Active, Status::Inactive]),
            time: VersionTime::LATEST,
            modules: BTreeSet::new(),
        }
    }

    pub fn allows(&self, status: Status, time: VersionTime, module: Nid) -> bool {
        self.allowed_states.contains(&status)
            && time <= self.time
            && (self.modules.is_empty() || self.modules.contains(&module))
    }

    pub fn with_time(&self, time: VersionTime) -> Self {
        let mut next = self.clone();
        next.time = time;
        next
    }
}

/// A stamp filter plus precedence policy and preferred path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StampCoordinate {
    pub filter: StampFilter,
    pub precedence: Precedence,
    pub path: Nid,
}

impl StampCoordinate {
    pub fn new(filter: StampFilter, precedence: Precedence, path: Nid) -> Self {
        Self {
            filter,
            precedence,
            path,
        }
    }

    /// Active-only latest view on `path` with path precedence.
    pub fn active_latest_on(path: Nid) -> Self {
        Self::new(StampFilter::active_latest(), Precedence::Path, path)
    }

    pub fn with_time(&self, time: VersionTime) -> Self {
        Self {
            filter: self.filter.with_time(time),
            ..self.clone()
        }
    }
}

/// Language/dialect preference order for description selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageCoordinate {
    pub language: Nid,
    /// Dialect assemblages, most preferred first.
    pub dialect_preference: Vec<Nid>,
    /// Description types, most preferred first.
    pub type_preference: Vec<Nid>,
}

impl LanguageCoordinate {
    pub fn new(language: Nid, dialect_preference: Vec<Nid>, type_preference: Vec<Nid>) -> Self {
        Self {
            language,
            dialect_preference,
            type_preference,
        }
    }
}

/// The full view coordinate: stamp policy, optional language preference,
/// and which premise the taxonomy/classification layer consumes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifoldCoordinate {
    pub stamp: StampCoordinate,
    pub language: Option<LanguageCoordinate>,
    pub premise: PremiseType,
}

impl ManifoldCoordinate {
    pub fn new(
        stamp: StampCoordinate,
        language: Option<LanguageCoordinate>,
        premise: PremiseType,
    ) -> Self {
        Self {
            stamp,
            language,
            premise,
        }
    }

    pub fn stated(stamp: StampCoordinate) -> Self {
        Self::new(stamp, None, PremiseType::Stated)
    }

    pub fn inferred(stamp: StampCoordinate) -> Self {
        Self::new(stamp, None, PremiseType::Inferred)
    }
}
