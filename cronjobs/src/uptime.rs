//! Per-epoch validator uptime aggregation and the uptime vote.

use std::sync::Arc;

use async_trait::async_trait;

use attest_store::{Store, StoreError};
use attest_types::{NodeId, StakingInterval, Timestamp, UptimeAggregation, UptimeSample, UptimeStatus};
use attest_utils::Clock;

use crate::contracts::UptimeVoting;
use crate::epoch::{owed_range, EpochConfig};
use crate::job::{Cronjob, JobReport};
use crate::CronjobError;

pub const UPTIME_JOB: &str = "uptime";

/// Connected time inside `[window_start, window_end]` given the node's
/// samples in that window, oldest first.
///
/// The span between two samples counts unless the earlier one is
/// `Disconnected`. The tail after the last sample always counts up to the
/// window end. Time before the first sample never counts.
pub fn connected_seconds(samples: &[UptimeSample], window_start: Timestamp, window_end: Timestamp) -> u64 {
    let mut total = 0;
    let mut iter = samples
        .iter()
        .filter(|s| s.timestamp >= window_start && s.timestamp <= window_end)
        .peekable();
    while let Some(sample) = iter.next() {
        match iter.peek() {
            None => total += window_end.saturating_sub(sample.timestamp),
            Some(_) if sample.status == UptimeStatus::Disconnected => {}
            Some(next) => total += next.timestamp.saturating_sub(sample.timestamp),
        }
    }
    total
}

/// Clip each interval to `[from, to)` and merge overlaps. Input must be
/// sorted by start time.
fn staking_windows(intervals: &[StakingInterval], from: Timestamp, to: Timestamp) -> Vec<(Timestamp, Timestamp)> {
    let mut windows: Vec<(Timestamp, Timestamp)> = Vec::new();
    for interval in intervals {
        let start = interval.start_time.max(from);
        let end = interval.end_time.min(to);
        if start >= end {
            continue;
        }
        match windows.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => windows.push((start, end)),
        }
    }
    windows
}

/// Aggregations for every validator that staked during `epoch`, sorted by
/// node id.
pub fn aggregate_epoch<S>(store: &S, epochs: &EpochConfig, epoch: u64) -> Result<Vec<UptimeAggregation>, StoreError>
where
    S: Store + ?Sized,
{
    let (from, to) = epochs.time_range(epoch);
    let intervals = store.staking_intervals(from, to)?;

    let mut aggregations = Vec::new();
    for node_intervals in intervals.chunk_by(|a, b| a.node_id == b.node_id) {
        let node_id = node_intervals[0].node_id;
        let windows = staking_windows(node_intervals, from, to);
        let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
            continue;
        };

        let mut connected = 0;
        let mut staked = 0;
        for &(start, end) in &windows {
            let samples = store.node_samples(&node_id, start, end)?;
            connected += connected_seconds(&samples, start, end);
            staked += end.saturating_sub(start);
        }
        aggregations.push(UptimeAggregation {
            epoch,
            node_id,
            start_time: first.0,
            end_time: last.1,
            connected_seconds: connected as i64,
            staking_duration_seconds: staked as i64,
        });
    }
    Ok(aggregations)
}

fn persist_aggregations<S>(store: &S, rows: &[UptimeAggregation]) -> Result<(), StoreError>
where
    S: Store + ?Sized,
{
    let mut batch = store.write_batch()?;
    for row in rows {
        batch.put_aggregation(row)?;
    }
    batch.commit()
}

pub struct UptimeAggregationJob<S: ?Sized, C> {
    store: Arc<S>,
    contract: Arc<C>,
    epochs: EpochConfig,
    clock: Arc<dyn Clock>,
    threshold: f64,
    next_epoch: Option<u64>,
}

impl<S, C> UptimeAggregationJob<S, C>
where
    S: Store + ?Sized,
    C: UptimeVoting,
{
    pub fn new(store: Arc<S>, contract: Arc<C>, epochs: EpochConfig, clock: Arc<dyn Clock>, threshold: f64) -> Self {
        Self {
            store,
            contract,
            epochs,
            clock,
            threshold,
            next_epoch: None,
        }
    }

    /// First epoch not yet voted on by this process.
    pub fn next_epoch(&self) -> Result<u64, StoreError> {
        match self.next_epoch {
            Some(next) => Ok(next),
            None => Ok(self.store.max_aggregated_epoch()?.map_or(0, |e| e + 1)),
        }
    }

    /// Each epoch's rows are committed before its vote is submitted.
    async fn aggregate_and_vote(
        &mut self,
        owed: std::ops::RangeInclusive<u64>,
        report: &mut JobReport,
    ) -> Result<(), CronjobError> {
        for epoch in owed {
            let aggregations = aggregate_epoch(self.store.as_ref(), &self.epochs, epoch)?;
            let qualified: Vec<NodeId> = aggregations
                .iter()
                .filter(|a| a.meets_threshold(self.threshold))
                .map(|a| a.node_id)
                .collect();
            if !aggregations.is_empty() {
                persist_aggregations(self.store.as_ref(), &aggregations)?;
            }

            self.contract.submit_uptime_vote(epoch, &qualified).await?;
            tracing::info!(epoch, qualified = qualified.len(), "submitted uptime vote");
            self.next_epoch = Some(epoch + 1);
            report.epochs += 1;
            report.submitted += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl<S, C> Cronjob for UptimeAggregationJob<S, C>
where
    S: Store + ?Sized,
    C: UptimeVoting,
{
    fn name(&self) -> &str {
        UPTIME_JOB
    }

    async fn run_cycle(&mut self) -> Result<JobReport, CronjobError> {
        let mut report = JobReport::default();
        let Some(end) = self.epochs.last_elapsed(self.clock.now()) else {
            return Ok(report);
        };
        // Bootstrap must be pinned before any rows land.
        let next = self.next_epoch()?;
        self.next_epoch = Some(next);
        let Some(owed) = owed_range(next, end) else {
            return Ok(report);
        };

        self.aggregate_and_vote(owed, &mut report).await?;
        Ok(report)
    }
}
