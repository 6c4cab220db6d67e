//! STAMP sequences and the interning service.
//!
//! A Stamp is the (status, time, author, module, path) tuple stamped on every
//! version. Stamps are interned once and referenced everywhere by a compact
//! [`StampKey`]; two versions with identical content but different keys are
//! distinct versions.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::error::CoreError;
use super::identity::Nid;
use super::status::Status;
use super::time::VersionTime;

/// The five-field version provenance tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub status: Status,
    pub time: VersionTime,
    pub author: Nid,
    pub module: Nid,
    pub path: Nid,
}

impl Stamp {
    pub fn new(status: Status, time: VersionTime, author: Nid, module: Nid, path: Nid) -> Self {
        Self {
            status,
            time,
            author,
            module,
            path,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.time.is_committed()
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.module.cmp(&other.module))
            .then_with(|| self.author.cmp(&other.author)) // deterministic tiebreak
            .then_with(|| self.status.cmp(&other.status))
    }
}

/// Compact interned key for a [`Stamp`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StampKey(pub u32);

impl fmt::Debug for StampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StampKey({})", self.0)
    }
}

impl fmt::Display for StampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step in a path's branch history: this path branched off `origin` at
/// `branched_at`. Versions on the origin are visible through the child path
/// only up to that instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOrigin {
    pub origin: Nid,
    pub branched_at: VersionTime,
}

#[derive(Default)]
struct StampTables {
    by_stamp: HashMap<Stamp, StampKey>,
    stamps: Vec<Stamp>,
    origins: HashMap<Nid, Vec<PathOrigin>>,
}

/// Allocates and resolves stamp keys; owns path-precedence metadata.
///
/// Interning and origin registration are serialized behind one mutex; the
/// tables are read-mostly after load.
pub struct StampService {
    tables: Mutex<StampTables>,
}

impl StampService {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(StampTables::default()),
        }
    }

    /// Intern a stamp, returning its compact key. Idempotent.
    pub fn key_for_stamp(&self, stamp: Stamp) -> StampKey {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(key) = tables.by_stamp.get(&stamp) {
            return *key;
        }
        let key = StampKey(tables.stamps.len() as u32);
        tables.stamps.push(stamp.clone());
        tables.by_stamp.insert(stamp, key);
        key
    }

    pub fn stamp_for_key(&self, key: StampKey) -> Result<Stamp, CoreError> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables
            .stamps
            .get(key.0 as usize)
            .cloned()
            .ok_or(CoreError::UnknownStamp { key })
    }

    /// Record that `path` branched off `origin` at `branched_at`.
    pub fn register_path_origin(&self, path: Nid, origin: Nid, branched_at: VersionTime) {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let entry = tables.origins.entry(path).or_default();
        if !entry.iter().any(|o| o.origin == origin) {
            entry.push(PathOrigin {
                origin,
                branched_at,
            });
        }
    }

    pub fn path_origins(&self, path: Nid) -> Vec<PathOrigin> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.origins.get(&path).cloned().unwrap_or_default()
    }

    /// All registered paths that have at least one origin.
    pub fn paths_with_origins(&self) -> Vec<(Nid, Vec<PathOrigin>)> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = tables
            .origins
            .iter()
            .map(|(path, origins)| (*path, origins.clone()))
            .collect();
        out.sort_by_key(|(path, _)| *path);
        out
    }

    /// The precedence chain for `path`: the path itself (unbounded horizon),
    /// then its transitive origins nearest first, each capped at the earliest
    /// branch point on the way down. A visited set guards against malformed
    /// cyclic origin data.
    pub fn path_chain(&self, path: Nid) -> Vec<(Nid, VersionTime)> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut chain = vec![(path, VersionTime::LATEST)];
        let mut visited = vec![path];
        let mut frontier = vec![(path, VersionTime::LATEST)];
        while let Some((current, horizon)) = frontier.pop() {
            let Some(origins) = tables.origins.get(&current) else {
                continue;
            };
            for o in origins {
                if visited.contains(&o.origin) {
                    continue;
                }
                visited.push(o.origin);
                let capped = horizon.min(o.branched_at);
                chain.push((o.origin, capped));
                frontier.push((o.origin, capped));
            }
        }
        chain
    }

    /// Human-readable STAMP rendering for diagnostics and export.
    ///
    /// Never machine-parsed.
    pub fn describe(&self, key: StampKey) -> String {
        match self.stamp_for_key(key) {
            Ok(s) => format!(
                "s:{} t:{} a:{} m:{} p:{}",
                s.status, s.time, s.author, s.module, s.path
            ),
            Err(_) => format!("s:? t:? a:? m:? p:? (unknown key {key})"),
        }
    }
}

impl Default for StampService {
    fn default() -> Self {
        Self::new()
    }
}
