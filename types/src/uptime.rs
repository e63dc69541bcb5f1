//! Validator uptime samples and their per-epoch aggregation.

use serde::{Deserialize, Serialize};

use crate::{NodeId, Timestamp};

/// Outcome recorded by one uptime sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UptimeStatus {
    Connected,
    Disconnected,
    Timeout,
    ServiceError,
    IndexerStarted,
}

impl UptimeStatus {
    pub fn code(&self) -> u8 {
        match self {
            UptimeStatus::Connected => 0,
            UptimeStatus::Disconnected => 1,
            UptimeStatus::Timeout => 2,
            UptimeStatus::ServiceError => 3,
            UptimeStatus::IndexerStarted => 4,
        }
    }
}

/// A raw connectivity sample. Append-only.
///
/// `node_id` is `None` for process-level events (sampler timeouts, service
/// errors, indexer restarts).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeSample {
    pub node_id: Option<NodeId>,
    pub status: UptimeStatus,
    pub timestamp: Timestamp,
}

/// Connected time of one node within one epoch. Unique per `(epoch, node_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeAggregation {
    pub epoch: u64,
    pub node_id: NodeId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub connected_seconds: i64,
    pub staking_duration_seconds: i64,
}

impl UptimeAggregation {
    /// Whether this node met the uptime threshold. Nodes that did not stake
    /// during the epoch never qualify.
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        if self.staking_duration_seconds <= 0 {
            return false;
        }
        self.connected_seconds as f64 / self.staking_duration_seconds as f64 >= threshold
    }
}
