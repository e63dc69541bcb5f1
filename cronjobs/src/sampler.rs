//! Periodic validator connectivity sampling.

use std::sync::Arc;

use async_trait::async_trait;

use attest_indexer::LedgerClient;
use attest_store::{StoreError, UptimeStore};
use attest_types::{Timestamp, UptimeSample, UptimeStatus};
use attest_utils::Clock;

use crate::job::{Cronjob, JobReport};
use crate::CronjobError;

pub const SAMPLER_JOB: &str = "uptime_sampler";

/// Record that the service (re)started at `now`.
pub fn record_start<S>(store: &S, now: Timestamp) -> Result<(), StoreError>
where
    S: UptimeStore + ?Sized,
{
    store.append_sample(&UptimeSample {
        node_id: None,
        status: UptimeStatus::IndexerStarted,
        timestamp: now,
    })
}

pub struct UptimeSamplerJob<S: ?Sized, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    clock: Arc<dyn Clock>,
}

impl<S, L> UptimeSamplerJob<S, L>
where
    S: UptimeStore + Send + Sync + ?Sized,
    L: LedgerClient,
{
    pub fn new(store: Arc<S>, ledger: Arc<L>, clock: Arc<dyn Clock>) -> Self {
        Self { store, ledger, clock }
    }
}

#[async_trait]
impl<S, L> Cronjob for UptimeSamplerJob<S, L>
where
    S: UptimeStore + Send + Sync + ?Sized,
    L: LedgerClient,
{
    fn name(&self) -> &str {
        SAMPLER_JOB
    }

    async fn run_cycle(&mut self) -> Result<JobReport, CronjobError> {
        let validators = self.ledger.current_validators().await;
        let now = self.clock.now();
        let samples: Vec<UptimeSample> = match validators {
            Ok(validators) => validators
                .into_iter()
                .map(|v| UptimeSample {
                    node_id: Some(v.node_id),
                    status: if v.connected {
                        UptimeStatus::Connected
                    } else {
                        UptimeStatus::Disconnected
                    },
                    timestamp: now,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "validator query failed");
                let status = if e.is_timeout() {
                    UptimeStatus::Timeout
                } else {
                    UptimeStatus::ServiceError
                };
                vec![UptimeSample {
                    node_id: None,
                    status,
                    timestamp: now,
                }]
            }
        };

        for sample in &samples {
            self.store.append_sample(sample)?;
        }
        tracing::debug!(samples = samples.len(), "recorded uptime samples");
        Ok(JobReport {
            epochs: 1,
            submitted: samples.len() as u64,
            benign: 0,
        })
    }
}
