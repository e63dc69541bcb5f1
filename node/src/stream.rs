//! Timer loop driving one indexing stream.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use attest_cronjobs::Schedule;
use attest_indexer::{BatchProcessor, CycleOutcome, IndexerError, IndexingEngine, LedgerClient};
use attest_store::Store;
use attest_utils::ErrorKind;

use crate::IndexerMetrics;

fn log_failure(stream: &str, err: &IndexerError) {
    match err.kind() {
        ErrorKind::Transient => {
            tracing::warn!(stream, kind = %err.kind(), error = %err, "indexing cycle failed")
        }
        _ => tracing::error!(stream, kind = %err.kind(), error = %err, "indexing cycle failed"),
    }
}

/// Run `engine` every `schedule.interval` until shutdown.
pub async fn run_stream<S, L, P>(
    mut engine: IndexingEngine<S, L, P>,
    schedule: Schedule,
    mut shutdown: broadcast::Receiver<()>,
    metrics: Arc<IndexerMetrics>,
) where
    S: Store + ?Sized,
    L: LedgerClient,
    P: BatchProcessor,
{
    let stream = engine.stream().to_string();
    let next_index = metrics.stream_next_index.with_label_values(&[stream.as_str()]);
    let mut interval = tokio::time::interval(schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!(stream = %stream, "indexing stream shutting down");
                break;
            }
            _ = interval.tick() => {
                match tokio::time::timeout(schedule.timeout, engine.run_cycle()).await {
                    Ok(Ok(CycleOutcome::Idle { next_index: next, .. })) => {
                        next_index.set(next as i64);
                    }
                    Ok(Ok(CycleOutcome::Processed { from, to, next_index: next, transactions, resolved })) => {
                        metrics.containers_indexed.inc_by(to - from + 1);
                        next_index.set(next as i64);
                        tracing::info!(
                            stream = %stream,
                            from,
                            to,
                            transactions,
                            from_cache = resolved.from_cache,
                            from_store = resolved.from_store,
                            from_remote = resolved.from_remote,
                            "indexed containers"
                        );
                    }
                    Ok(Err(err)) => {
                        log_failure(&stream, &err);
                        metrics.indexing_cycles_failed.inc();
                    }
                    Err(_) => {
                        tracing::warn!(stream = %stream, timeout_secs = schedule.timeout.as_secs(), "indexing cycle timed out");
                        metrics.indexing_cycles_failed.inc();
                    }
                }
            }
        }
    }
}
