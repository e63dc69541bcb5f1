//! The polling indexing engine: fetch the next range of containers,
//! transform, resolve and persist them together with the stream's cursor.

use std::sync::Arc;

use attest_store::Store;
use attest_types::{Progress, Timestamp};
use attest_utils::Clock;

use crate::ledger::LedgerClient;
use crate::processor::{BatchProcessor, BatchRows};
use crate::resolver::{ResolveStats, UtxoResolver};
use crate::IndexerError;

/// Default number of containers fetched per cycle.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Static parameters of one indexing stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Name of the progress record this stream owns.
    pub name: String,
    /// Containers below this index are never fetched.
    pub start_index: u64,
    pub batch_size: u64,
}

impl StreamConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_index: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// What one call to [`IndexingEngine::run_cycle`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing new on the ledger.
    Idle { next_index: u64, last_accepted: u64 },
    /// Containers `[from, to]` were persisted.
    Processed {
        from: u64,
        to: u64,
        next_index: u64,
        transactions: usize,
        resolved: ResolveStats,
    },
}

/// Drives one stream. Not reentrant: the caller runs at most one cycle at a
/// time, which `&mut self` enforces.
pub struct IndexingEngine<S: ?Sized, L, P> {
    config: StreamConfig,
    store: Arc<S>,
    ledger: Arc<L>,
    processor: P,
    resolver: UtxoResolver,
    clock: Arc<dyn Clock>,
}

impl<S, L, P> IndexingEngine<S, L, P>
where
    S: Store + ?Sized,
    L: LedgerClient,
    P: BatchProcessor,
{
    pub fn new(
        config: StreamConfig,
        store: Arc<S>,
        ledger: Arc<L>,
        processor: P,
        resolver: UtxoResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            ledger,
            processor,
            resolver,
            clock,
        }
    }

    pub fn stream(&self) -> &str {
        &self.config.name
    }

    /// Run one fetch → transform → resolve → persist cycle.
    ///
    /// On any error nothing is written and the cursor stays where it was, so
    /// the next cycle retries the same range.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, IndexerError> {
        self.resolver.reset();

        let progress = self
            .store
            .get_progress(&self.config.name)?
            .unwrap_or_else(|| Progress::new(self.config.name.clone()));
        let from = progress.next_index.max(self.config.start_index);

        let last_accepted = self.ledger.last_accepted().await?;
        if from > last_accepted {
            // Caught up: refresh the watermark the cronjobs read.
            let touched = progress.advanced(progress.next_index, last_accepted, self.clock.now());
            self.persist(&BatchRows::default(), &touched)?;
            tracing::trace!(stream = %self.config.name, from, last_accepted, "no new containers");
            return Ok(CycleOutcome::Idle {
                next_index: progress.next_index,
                last_accepted,
            });
        }

        let count = self.config.batch_size.min(last_accepted - from + 1);
        let containers = self.ledger.container_range(from, count).await?;
        if containers.is_empty() {
            return Err(crate::LedgerError::InvalidResponse(format!(
                "empty range at {from} while last accepted is {last_accepted}"
            ))
            .into());
        }
        if containers.len() as u64 > count {
            return Err(crate::LedgerError::InvalidResponse(format!(
                "asked for {count} containers at {from}, got {}",
                containers.len()
            ))
            .into());
        }

        self.processor.reset(containers.len());
        let mut expected = from;
        for container in &containers {
            if container.index != expected {
                return Err(IndexerError::OutOfOrder {
                    expected,
                    actual: container.index,
                });
            }
            self.processor.add_container(container)?;
            expected += 1;
        }
        let last_processed = expected - 1;

        let mut rows = self.processor.process_batch()?;
        self.resolver.add_outputs(&rows.outputs);
        let resolved = self
            .resolver
            .resolve(self.store.as_ref(), &mut rows.inputs)
            .await?;

        let next_index = last_processed + 1;
        let advanced = progress.advanced(next_index, last_accepted, self.clock.now());
        self.persist(&rows, &advanced)?;

        tracing::debug!(
            stream = %self.config.name,
            from,
            to = last_processed,
            transactions = rows.transactions.len(),
            inputs = rows.inputs.len(),
            "indexed containers"
        );
        Ok(CycleOutcome::Processed {
            from,
            to: last_processed,
            next_index,
            transactions: rows.transactions.len(),
            resolved,
        })
    }

    /// Write the rows and the cursor in one batch. Kept synchronous so the
    /// batch never lives across an await point.
    fn persist(&self, rows: &BatchRows, progress: &Progress) -> Result<(), IndexerError> {
        let mut batch = self.store.write_batch()?;
        self.processor.persist(rows, batch.as_mut())?;
        batch.put_progress(progress)?;
        batch.commit()?;
        Ok(())
    }

    /// Timestamp of the last successful cycle, if any.
    pub fn last_updated(&self) -> Result<Option<Timestamp>, IndexerError> {
        Ok(self
            .store
            .get_progress(&self.config.name)?
            .map(|p| p.updated_at))
    }
}
