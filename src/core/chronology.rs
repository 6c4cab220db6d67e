//! Chronicles: append-only per-component version histories, and the STAMP
//! resolution that picks the single visible version for a coordinate.
//!
//! INVARIANT: a chronicle holds at least one version, and at most one
//! uncommitted version per author. Nothing is ever removed from the list.

use serde::{Deserialize, Serialize};

use super::coordinate::{Precedence, StampCoordinate};
use super::error::VersionError;
use super::identity::{ComponentId, Nid};
use super::stamp::{Stamp, StampService};
use super::status::Status;
use super::time::VersionTime;
use super::version::{Version, VersionPayload};

/// Result of "latest version for coordinate".
///
/// A contradiction (two or more mutually incomparable survivors) is a
/// first-class result, not an error: callers must branch on it. The system
/// never silently picks an arbitrary winner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LatestVersion<'a> {
    Absent,
    One(&'a Version),
    Contradiction(Vec<&'a Version>),
}

impl<'a> LatestVersion<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, LatestVersion::Absent)
    }

    pub fn is_contradicted(&self) -> bool {
        matches!(self, LatestVersion::Contradiction(_))
    }

    /// The single visible version, if resolution was unambiguous.
    pub fn one(&self) -> Option<&'a Version> {
        match self {
            LatestVersion::One(v) => Some(v),
            _ => None,
        }
    }
}

/// Append-only version history of one component.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chronology {
    id: ComponentId,
    nid: Nid,
    assemblage: Nid,
    referenced_component: Option<Nid>,
    versions: Vec<Version>,
}

impl Chronology {
    /// A chronicle is born with its first version; there is no empty state.
    pub fn new(
        id: ComponentId,
        nid: Nid,
        assemblage: Nid,
        referenced_component: Option<Nid>,
        first: Version,
    ) -> Self {
        Self {
            id,
            nid,
            assemblage,
            referenced_component,
            versions: vec![first],
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn nid(&self) -> Nid {
        self.nid
    }

    pub fn assemblage(&self) -> Nid {
        self.assemblage
    }

    pub fn referenced_component(&self) -> Option<Nid> {
        self.referenced_component
    }

    /// Versions in insertion order (not time order).
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    fn uncommitted_position(
        &self,
        service: &StampService,
        author: Nid,
    ) -> Result<Option<usize>, VersionError> {
        for (i, v) in self.versions.iter().enumerate() {
            let stamp = service.stamp_for_key(v.stamp())?;
            if !stamp.is_committed() && stamp.author == author {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Append a new uncommitted version.
    ///
    /// Fails fast if `author` already holds an uncommitted version on this
    /// chronicle; the existing slot must be committed first.
    pub fn create_mutable_version(
        &mut self,
        service: &StampService,
        status: Status,
        author: Nid,
        module: Nid,
        path: Nid,
        payload: VersionPayload,
    ) -> Result<&Version, VersionError> {
        if self.uncommitted_position(service, author)?.is_some() {
            return Err(VersionError::UncommittedExists {
                nid: self.nid,
                author,
            });
        }
        let key = service.key_for_stamp(Stamp::new(
            status,
            VersionTime::UNCOMMITTED,
            author,
            module,
            path,
        ));
        self.versions.push(Version::new(key, payload));
        tracing::debug!(nid = self.nid.value(), author = author.value(), "mutable version created");
        Ok(self.versions.last().expect("just pushed"))
    }

    /// Replace the payload of `author`'s uncommitted version.
    ///
    /// Committed versions are immutable; without an uncommitted slot this is
    /// an illegal mutation.
    pub fn update_uncommitted(
        &mut self,
        service: &StampService,
        author: Nid,
        payload: VersionPayload,
    ) -> Result<(), VersionError> {
        match self.uncommitted_position(service, author)? {
            Some(i) => {
                self.versions[i].set_payload(payload);
                Ok(())
            }
            None => Err(VersionError::CommittedImmutable { nid: self.nid }),
        }
    }

    /// Commit `author`'s uncommitted version, swapping the sentinel time for
    /// `time` through a freshly interned stamp. Atomic from the caller's
    /// perspective: the version either has the sentinel or the real time.
    pub fn commit(
        &mut self,
        service: &StampService,
        author: Nid,
        time: VersionTime,
    ) -> Result<(), VersionError> {
        let position = self
            .uncommitted_position(service, author)?
            .ok_or(VersionError::NothingToCommit {
                nid: self.nid,
                author,
            })?;
        let old = service.stamp_for_key(self.versions[position].stamp())?;
        let key = service.key_for_stamp(Stamp::new(
            old.status, time, old.author, old.module, old.path,
        ));
        self.versions[position].set_stamp(key);
        tracing::debug!(
            nid = self.nid.value(),
            author = author.value(),
            time = time.millis(),
            "version committed"
        );
        Ok(())
    }

    /// Resolve the single visible "latest" version under `coordinate`.
    ///
    /// Pure function of the chronicle and coordinate. Filters by
    /// status/module/time, then applies the coordinate's precedence policy;
    /// survivors with no remaining order form a contradiction set.
    pub fn latest_version<'a>(
        &'a self,
        coordinate: &StampCoordinate,
        service: &StampService,
    ) -> LatestVersion<'a> {
        let filtered: Vec<(&Version, Stamp)> = self
            .versions
            .iter()
            .filter_map(|v| {
                let stamp = service.stamp_for_key(v.stamp()).ok()?;
                coordinate
                    .filter
                    .allows(stamp.status, stamp.time, stamp.module)
                    .then_some((v, stamp))
            })
            .collect();
        if filtered.is_empty() {
            return LatestVersion::Absent;
        }

        match coordinate.precedence {
            Precedence::Time => Self::latest_by_time(filtered),
            Precedence::Path => {
                for (path, horizon) in service.path_chain(coordinate.path) {
                    let on_path: Vec<(&Version, Stamp)> = filtered
                        .iter()
                        .filter(|(_, s)| s.path == path && s.time <= horizon)
                        .map(|(v, s)| (*v, s.clone()))
                        .collect();
                    if !on_path.is_empty() {
                        return Self::latest_by_time(on_path);
                    }
                }
                LatestVersion::Absent
            }
        }
    }

    fn latest_by_time(candidates: Vec<(&Version, Stamp)>) -> LatestVersion<'_> {
        let max_time = candidates
            .iter()
            .map(|(_, s)| s.time)
            .max()
            .expect("candidates non-empty");
        let at_max: Vec<&Version> = candidates
            .into_iter()
            .filter(|(_, s)| s.time == max_time)
            .map(|(v, _)| v)
            .collect();
        match at_max.as_slice() {
            [single] => LatestVersion::One(single),
            _ => LatestVersion::Contradiction(at_max),
        }
    }
}
