//! Core capability errors (identity, stamps, version mutation, store lookup).
//!
//! These are bounded and stable: core errors represent domain/refusal states,
//! not library implementation details.

use thiserror::Error;
use uuid::Uuid;

use crate::error::{Effect, Transience};

use super::identity::Nid;
use super::stamp::StampKey;

/// Identity and stamp resolution failures.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error("no nid assigned for uuid {uuid}")]
    UnknownUuid { uuid: Uuid },
    #[error("nid {nid} is not registered with the identifier service")]
    UnknownNid { nid: Nid },
    #[error("stamp key {key} was never interned")]
    UnknownStamp { key: StampKey },
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        // Pure domain/input failures.
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Illegal chronicle mutation.
///
/// Fail-fast programmer errors: a committed version is immutable, and each
/// author holds at most one uncommitted version per chronicle.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum VersionError {
    #[error("chronicle {nid} already holds an uncommitted version for author {author}")]
    UncommittedExists { nid: Nid, author: Nid },
    #[error("chronicle {nid} has no uncommitted version for author {author}")]
    NothingToCommit { nid: Nid, author: Nid },
    #[error("version on chronicle {nid} is committed and immutable")]
    CommittedImmutable { nid: Nid },
    #[error(transparent)]
    Stamp(#[from] CoreError),
}

impl VersionError {
    pub fn transience(&self) -> Transience {
        match self {
            Self::Stamp(e) => e.transience(),
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Self::Stamp(e) => e.effect(),
            _ => Effect::None,
        }
    }
}

/// Store lookup failures.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum StoreError {
    #[error("no chronicle for nid {nid}")]
    NotFound { nid: Nid },
    #[error("chronicle {nid} already exists in the store")]
    AlreadyExists { nid: Nid },
}

impl StoreError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
