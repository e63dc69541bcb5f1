//! LMDB implementation of UptimeStore.

use std::ops::Bound;

use heed::RwTxn;

use attest_store::{StoreError, UptimeStore};
use attest_types::{NodeId, Timestamp, UptimeAggregation, UptimeSample};

use crate::environment::{decode, encode, put_unique};
use crate::keys::{aggregation_key, epoch_from_aggregation_key, sample_key, sample_range};
use crate::{LmdbEnvironment, LmdbError};

pub(crate) fn write_aggregation(
    env: &LmdbEnvironment,
    txn: &mut RwTxn,
    aggregation: &UptimeAggregation,
) -> Result<(), StoreError> {
    let key = aggregation_key(aggregation.epoch, &aggregation.node_id);
    put_unique(
        &env.aggregations_db,
        txn,
        &key,
        &encode(aggregation)?,
        &format!("aggregation {} {}", aggregation.epoch, aggregation.node_id),
    )
}

impl UptimeStore for LmdbEnvironment {
    fn append_sample(&self, sample: &UptimeSample) -> Result<(), StoreError> {
        let key = sample_key(sample.node_id.as_ref(), sample.timestamp, sample.status);
        let mut wtxn = self.env().write_txn().map_err(LmdbError::from)?;
        self.samples_db
            .put(&mut wtxn, &key, &encode(sample)?)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn node_samples(
        &self,
        node_id: &NodeId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<UptimeSample>, StoreError> {
        let (lo, hi) = sample_range(node_id, from, to);
        let range = (Bound::Included(&lo[..]), Bound::Included(&hi[..]));
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let mut samples = Vec::new();
        for entry in self.samples_db.range(&rtxn, &range).map_err(LmdbError::from)? {
            let (_, value) = entry.map_err(LmdbError::from)?;
            samples.push(decode(value)?);
        }
        Ok(samples)
    }

    fn max_aggregated_epoch(&self) -> Result<Option<u64>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        match self.aggregations_db.last(&rtxn).map_err(LmdbError::from)? {
            Some((key, _)) => epoch_from_aggregation_key(key)
                .map(Some)
                .ok_or_else(|| StoreError::Corruption("short aggregation key".into())),
            None => Ok(None),
        }
    }

    fn aggregations_for_epoch(&self, epoch: u64) -> Result<Vec<UptimeAggregation>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let prefix = epoch.to_be_bytes();
        let mut aggregations = Vec::new();
        for entry in self
            .aggregations_db
            .prefix_iter(&rtxn, &prefix[..])
            .map_err(LmdbError::from)?
        {
            let (_, value) = entry.map_err(LmdbError::from)?;
            aggregations.push(decode(value)?);
        }
        Ok(aggregations)
    }
}
