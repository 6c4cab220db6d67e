//! Version time.
//!
//! Epoch-millisecond instants with one reserved sentinel meaning
//! "uncommitted". The sentinel sorts after every real instant, so an
//! uncommitted version is always the newest thing on its chronicle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A version's effective time in epoch milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTime(i64);

impl VersionTime {
    /// Reserved sentinel: the version exists but has not been committed.
    pub const UNCOMMITTED: VersionTime = VersionTime(i64::MAX);

    /// "Latest, including uncommitted" filter horizon.
    pub const LATEST: VersionTime = VersionTime(i64::MAX);

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        Self(ms)
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn is_committed(self) -> bool {
        self != Self::UNCOMMITTED
    }
}

impl fmt::Debug for VersionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_committed() {
            write!(f, "VersionTime({})", self.0)
        } else {
            write!(f, "VersionTime(uncommitted)")
        }
    }
}

impl fmt::Display for VersionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_committed() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "uncommitted")
        }
    }
}
