//! Uptime sample and aggregation storage trait.

use attest_types::{NodeId, Timestamp, UptimeAggregation, UptimeSample};

use crate::StoreError;

pub trait UptimeStore {
    /// Append a sample. Samples are never updated.
    fn append_sample(&self, sample: &UptimeSample) -> Result<(), StoreError>;

    /// Samples of one node with timestamp in `[from, to]`, oldest first.
    fn node_samples(
        &self,
        node_id: &NodeId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<UptimeSample>, StoreError>;

    /// Highest epoch with at least one persisted aggregation.
    fn max_aggregated_epoch(&self) -> Result<Option<u64>, StoreError>;

    /// Aggregations persisted for `epoch`, sorted by node id.
    fn aggregations_for_epoch(&self, epoch: u64) -> Result<Vec<UptimeAggregation>, StoreError>;
}
