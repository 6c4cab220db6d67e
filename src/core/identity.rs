//! Component identity.
//!
//! Nid: dense integer identifier, assigned once, never reused.
//! ComponentId: primordial UUID plus alias UUIDs.
//! IdentifierService: the external boundary that owns nid assignment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::CoreError;

/// Dense integer component identifier.
///
/// Stable within one store instance. The core never invents nids; it only
/// requests them from an [`IdentifierService`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nid(pub i32);

impl Nid {
    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Nid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nid({})", self.0)
    }
}

impl fmt::Display for Nid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component identity: one primordial UUID plus zero or more aliases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentId {
    primordial: Uuid,
    additional: Vec<Uuid>,
}

impl ComponentId {
    pub fn new(primordial: Uuid) -> Self {
        Self {
            primordial,
            additional: Vec::new(),
        }
    }

    pub fn with_additional(primordial: Uuid, additional: Vec<Uuid>) -> Self {
        Self {
            primordial,
            additional,
        }
    }

    pub fn primordial(&self) -> Uuid {
        self.primordial
    }

    pub fn additional(&self) -> &[Uuid] {
        &self.additional
    }

    /// All UUIDs naming this component, primordial first.
    pub fn uuids(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.primordial).chain(self.additional.iter().copied())
    }

    pub fn add_alias(&mut self, alias: Uuid) {
        if alias != self.primordial && !self.additional.contains(&alias) {
            self.additional.push(alias);
        }
    }
}

/// The identifier boundary: nid ⇄ UUID resolution and nid assignment.
///
/// Concurrent allocation must be serialized by the implementation.
pub trait IdentifierService: Send + Sync {
    /// Resolve a UUID to its nid, assigning a fresh nid on first sight.
    fn nid_for_uuid(&self, uuid: Uuid) -> Nid;

    /// Resolve a UUID to its nid without assigning.
    fn get_nid_for_uuid(&self, uuid: Uuid) -> Result<Nid, CoreError>;

    /// Resolve a nid back to its primordial UUID.
    fn uuid_for_nid(&self, nid: Nid) -> Result<Uuid, CoreError>;
}

#[derive(Default)]
struct IdentifierTables {
    by_uuid: HashMap<Uuid, Nid>,
    by_nid: HashMap<Nid, Uuid>,
    next: i32,
}

/// In-memory identifier service.
///
/// Allocation is serialized behind a single mutex; lookups share it because
/// the tables are small and write-mostly only during load.
pub struct MemoryIdentifierService {
    tables: Mutex<IdentifierTables>,
}

impl MemoryIdentifierService {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(IdentifierTables {
                by_uuid: HashMap::new(),
                by_nid: HashMap::new(),
                next: 1,
            }),
        }
    }
}

impl Default for MemoryIdentifierService {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierService for MemoryIdentifierService {
    fn nid_for_uuid(&self, uuid: Uuid) -> Nid {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(nid) = tables.by_uuid.get(&uuid) {
            return *nid;
        }
        let nid = Nid(tables.next);
        tables.next += 1;
        tables.by_uuid.insert(uuid, nid);
        tables.by_nid.insert(nid, uuid);
        nid
    }

    fn get_nid_for_uuid(&self, uuid: Uuid) -> Result<Nid, CoreError> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables
            .by_uuid
            .get(&uuid)
            .copied()
            .ok_or(CoreError::UnknownUuid { uuid })
    }

    fn uuid_for_nid(&self, nid: Nid) -> Result<Uuid, CoreError> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables
            .by_nid
            .get(&nid)
            .copied()
            .ok_or(CoreError::UnknownNid { nid })
    }
}
