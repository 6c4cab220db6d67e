//! The chronology store: nid-keyed chronicle map plus derived indexes.
//!
//! Committed versions are immutable and safely shared; the store serializes
//! structural mutation behind one RwLock. Indexes are derived state,
//! maintained incrementally on insert.

use std::collections::HashMap;
use std::sync::RwLock;

use super::chronology::Chronology;
use super::error::StoreError;
use super::identity::Nid;

#[derive(Default)]
struct StoreInner {
    chronologies: HashMap<Nid, Chronology>,
    /// assemblage nid -> member semantic nids
    by_assemblage: HashMap<Nid, Vec<Nid>>,
    /// referenced component nid -> semantic nids annotating it
    by_referenced: HashMap<Nid, Vec<Nid>>,
}

/// In-memory chronicle store.
pub struct ChronologyStore {
    inner: RwLock<StoreInner>,
}

impl ChronologyStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Register a new chronicle. Nids are assigned once; re-inserting an
    /// existing nid is an error, not an overwrite.
    pub fn insert(&self, chronology: Chronology) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let nid = chronology.nid();
        if inner.chronologies.contains_key(&nid) {
            return Err(StoreError::AlreadyExists { nid });
        }
        inner
            .by_assemblage
            .entry(chronology.assemblage())
            .or_default()
            .push(nid);
        if let Some(referenced) = chronology.referenced_component() {
            inner.by_referenced.entry(referenced).or_default().push(nid);
        }
        inner.chronologies.insert(nid, chronology);
        Ok(())
    }

    /// Optional lookup: absent ids yield `None`.
    pub fn get(&self, nid: Nid) -> Option<Chronology> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.chronologies.get(&nid).cloned()
    }

    /// Lookup documented as "caller must know this exists".
    pub fn get_expected(&self, nid: Nid) -> Result<Chronology, StoreError> {
        self.get(nid).ok_or(StoreError::NotFound { nid })
    }

    pub fn contains(&self, nid: Nid) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.chronologies.contains_key(&nid)
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.chronologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member semantics of an assemblage, in insertion order.
    pub fn semantics_in_assemblage(&self, assemblage: Nid) -> Vec<Nid> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .by_assemblage
            .get(&assemblage)
            .cloned()
            .unwrap_or_default()
    }

    /// Semantics annotating a component, in insertion order.
    pub fn semantics_for_component(&self, component: Nid) -> Vec<Nid> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .by_referenced
            .get(&component)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate one chronicle under the store lock.
    ///
    /// The closure's error is propagated; the chronicle is only observed in
    /// its pre- or post-closure state.
    pub fn modify<T, E>(
        &self,
        nid: Nid,
        f: impl FnOnce(&mut Chronology) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match inner.chronologies.get_mut(&nid) {
            Some(chronology) => Ok(f(chronology)),
            None => Err(StoreError::NotFound { nid }),
        }
    }

    /// Drop everything. Callers owning derived caches must invalidate them.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *inner = StoreInner::default();
        tracing::info!("chronology store reset");
    }
}

impl Default for ChronologyStore {
    fn default() -> Self {
        Self::new()
    }
}
