//! Submits the Merkle root of each fully indexed epoch as this voter's vote.

use std::sync::Arc;

use async_trait::async_trait;

use attest_store::{ProgressStore, TransactionStore};
use attest_types::Progress;
use attest_utils::Clock;

use crate::contracts::VotingContract;
use crate::epoch::{owed_range, EpochConfig};
use crate::job::{Cronjob, JobReport};
use crate::stakes::{epoch_stakes, indexed_until, EpochCommitment};
use crate::CronjobError;

/// Progress record name of the voting job.
pub const VOTING_JOB: &str = "voting";

pub struct VotingJob<S: ?Sized, C> {
    store: Arc<S>,
    contract: Arc<C>,
    epochs: EpochConfig,
    clock: Arc<dyn Clock>,
    indexer_stream: String,
}

impl<S, C> VotingJob<S, C>
where
    S: ProgressStore + TransactionStore + Send + Sync + ?Sized,
    C: VotingContract,
{
    pub fn new(
        store: Arc<S>,
        contract: Arc<C>,
        epochs: EpochConfig,
        clock: Arc<dyn Clock>,
        indexer_stream: impl Into<String>,
    ) -> Self {
        Self {
            store,
            contract,
            epochs,
            clock,
            indexer_stream: indexer_stream.into(),
        }
    }
}

#[async_trait]
impl<S, C> Cronjob for VotingJob<S, C>
where
    S: ProgressStore + TransactionStore + Send + Sync + ?Sized,
    C: VotingContract,
{
    fn name(&self) -> &str {
        VOTING_JOB
    }

    async fn run_cycle(&mut self) -> Result<JobReport, CronjobError> {
        let mut report = JobReport::default();
        let now = self.clock.now();
        let Some(end) = self.epochs.last_elapsed(now) else {
            return Ok(report);
        };
        let mut state = self
            .store
            .get_progress(VOTING_JOB)?
            .unwrap_or_else(|| Progress::new(VOTING_JOB));
        let Some(owed) = owed_range(state.next_index, end) else {
            return Ok(report);
        };
        let watermark = indexed_until(self.store.as_ref(), &self.indexer_stream)?;

        for epoch in owed {
            let (_, epoch_end) = self.epochs.time_range(epoch);
            if epoch_end > watermark {
                tracing::debug!(epoch, %watermark, "epoch not fully indexed yet");
                break;
            }

            if self.contract.should_vote(epoch).await? {
                let stakes = epoch_stakes(self.store.as_ref(), &self.epochs, epoch)?;
                let commitment = EpochCommitment::build(stakes);
                let root = commitment.root();
                self.contract.submit_vote(epoch, root).await?;
                tracing::info!(epoch, %root, stakes = commitment.len(), "submitted epoch vote");
                report.submitted += 1;
            } else {
                tracing::debug!(epoch, "vote not needed");
            }

            state = state.advanced(epoch + 1, end, now);
            self.store.put_progress(&state)?;
            report.epochs += 1;
        }
        Ok(report)
    }
}
