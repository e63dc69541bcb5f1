//! Replicates each confirmed epoch's stakes onto the mirroring contract.
//!
//! An epoch is confirmed once the voting contract publishes a non-zero root
//! for it. Before any stake is mirrored, the locally rebuilt tree must match
//! that root exactly; a mismatch means the local index disagrees with the
//! voters and the cycle stops without advancing.

use std::sync::Arc;

use async_trait::async_trait;

use attest_merkle::H256;
use attest_store::{ProgressStore, StoreError, TransactionStore};
use attest_types::{AddressFormat, Progress, StakeEntry, Timestamp};
use attest_utils::Clock;

use crate::contracts::{classify_mirror_error, AddressBinder, MirroringContract, VotingContract};
use crate::epoch::EpochConfig;
use crate::job::{Cronjob, JobReport};
use crate::stakes::{epoch_stakes, indexed_until, EpochCommitment};
use crate::CronjobError;

/// Progress record name of the mirror job.
pub const MIRROR_JOB: &str = "mirror";

/// Point the mirror job at `epoch`, forwards or backwards.
pub fn reset_mirror_progress<S>(store: &S, epoch: u64, now: Timestamp) -> Result<Progress, StoreError>
where
    S: ProgressStore + ?Sized,
{
    let current = store
        .get_progress(MIRROR_JOB)?
        .unwrap_or_else(|| Progress::new(MIRROR_JOB));
    let reset = current.advanced(epoch, current.last_known_remote_index, now);
    store.put_progress(&reset)?;
    tracing::warn!(from = current.next_index, to = epoch, "mirror job progress reset");
    Ok(reset)
}

pub struct MirrorJob<S: ?Sized, V, M, B> {
    store: Arc<S>,
    voting: Arc<V>,
    mirror: Arc<M>,
    binder: Arc<B>,
    format: AddressFormat,
    epochs: EpochConfig,
    clock: Arc<dyn Clock>,
    indexer_stream: String,
}

impl<S, V, M, B> MirrorJob<S, V, M, B>
where
    S: ProgressStore + TransactionStore + Send + Sync + ?Sized,
    V: VotingContract,
    M: MirroringContract,
    B: AddressBinder,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        voting: Arc<V>,
        mirror: Arc<M>,
        binder: Arc<B>,
        format: AddressFormat,
        epochs: EpochConfig,
        clock: Arc<dyn Clock>,
        indexer_stream: impl Into<String>,
    ) -> Self {
        Self {
            store,
            voting,
            mirror,
            binder,
            format,
            epochs,
            clock,
            indexer_stream: indexer_stream.into(),
        }
    }

    pub fn reset(&self, epoch: u64) -> Result<Progress, CronjobError> {
        Ok(reset_mirror_progress(self.store.as_ref(), epoch, self.clock.now())?)
    }

    /// Highest epoch in `[start, current]` with a published root.
    async fn confirmed_end(&self, start: u64, current: u64) -> Result<Option<u64>, CronjobError> {
        let mut epoch = current;
        loop {
            if !self.voting.merkle_root(epoch).await?.is_zero() {
                return Ok(Some(epoch));
            }
            if epoch == start {
                return Ok(None);
            }
            epoch -= 1;
        }
    }

    /// Register the stake's signing key with the binder. Failures are logged
    /// and otherwise ignored.
    async fn bind_address(&self, entry: &StakeEntry) {
        let Some(public_key) = entry.signer_public_key.as_deref() else {
            return;
        };
        let address = self.format.format(&entry.address);
        match self.binder.is_address_registered(&entry.address).await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.binder.register_public_key(public_key).await {
                    tracing::warn!(%address, error = %e, "address registration failed");
                } else {
                    tracing::info!(%address, "registered staking address");
                }
            }
            Err(e) => tracing::warn!(%address, error = %e, "address registration check failed"),
        }
    }

    async fn mirror_epoch(
        &self,
        epoch: u64,
        remote_root: H256,
        report: &mut JobReport,
    ) -> Result<(), CronjobError> {
        let stakes = epoch_stakes(self.store.as_ref(), &self.epochs, epoch)?;
        let commitment = EpochCommitment::build(stakes);
        let local_root = commitment.root();
        if local_root != remote_root {
            return Err(CronjobError::RootMismatch {
                epoch,
                local: local_root,
                remote: remote_root,
            });
        }

        for (i, entry) in commitment.entries().iter().enumerate() {
            self.bind_address(entry).await;
            let proof = commitment.proof(i)?;
            match self.mirror.mirror_stake(entry, &proof).await {
                Ok(()) => {
                    tracing::info!(epoch, tx_id = %entry.tx_id, "mirrored stake");
                    report.submitted += 1;
                }
                Err(err) => match classify_mirror_error(&err) {
                    Some(outcome) => {
                        tracing::info!(epoch, tx_id = %entry.tx_id, outcome = outcome.as_str(), "stake not mirrored");
                        report.benign += 1;
                    }
                    None => return Err(err.into()),
                },
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S, V, M, B> Cronjob for MirrorJob<S, V, M, B>
where
    S: ProgressStore + TransactionStore + Send + Sync + ?Sized,
    V: VotingContract,
    M: MirroringContract,
    B: AddressBinder,
{
    fn name(&self) -> &str {
        MIRROR_JOB
    }

    async fn run_cycle(&mut self) -> Result<JobReport, CronjobError> {
        let mut report = JobReport::default();
        let now = self.clock.now();
        let Some(current) = self.epochs.epoch_index(now) else {
            return Ok(report);
        };
        let state = self
            .store
            .get_progress(MIRROR_JOB)?
            .unwrap_or_else(|| Progress::new(MIRROR_JOB));
        let start = state.next_index;
        if start > current {
            return Ok(report);
        }
        let Some(end) = self.confirmed_end(start, current).await? else {
            return Ok(report);
        };
        let watermark = indexed_until(self.store.as_ref(), &self.indexer_stream)?;

        for epoch in start..=end {
            let (_, epoch_end) = self.epochs.time_range(epoch);
            if epoch_end > watermark {
                tracing::info!(epoch, %watermark, "mirroring waits for the indexer");
                return Ok(report);
            }
            let remote_root = self.voting.merkle_root(epoch).await?;
            self.mirror_epoch(epoch, remote_root, &mut report).await?;
            report.epochs += 1;
        }

        self.store.put_progress(&state.advanced(end + 1, end, now))?;
        Ok(report)
    }
}
