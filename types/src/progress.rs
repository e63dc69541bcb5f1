//! Progress cursor shared by indexing streams and epoch cronjobs.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Durable cursor for one named stream or job.
///
/// For an indexing stream `next_index` is the next container index to
/// process; for a cronjob it is the next epoch owed. It only ever moves
/// forward, except for an explicit operator reset of the mirror job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub name: String,
    pub next_index: u64,
    pub last_known_remote_index: u64,
    pub updated_at: Timestamp,
}

impl Progress {
    /// A fresh cursor at zero, as created on first migration of a stream.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_index: 0,
            last_known_remote_index: 0,
            updated_at: Timestamp::EPOCH,
        }
    }

    /// Advance the cursor past a persisted unit of work.
    pub fn advanced(&self, next_index: u64, remote_index: u64, now: Timestamp) -> Self {
        Self {
            name: self.name.clone(),
            next_index,
            last_known_remote_index: remote_index,
            updated_at: now,
        }
    }
}
