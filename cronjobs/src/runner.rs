//! Timer loop driving one [`Cronjob`].

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use attest_utils::ErrorKind;

use crate::job::{Cronjob, JobReport};
use crate::CronjobError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    /// Upper bound on one cycle, remote calls included.
    pub timeout: Duration,
}

/// Log a failed cycle at the level its kind calls for.
pub fn log_failure(job: &str, err: &CronjobError) {
    match err.kind() {
        ErrorKind::DataInconsistency | ErrorKind::Configuration => {
            tracing::error!(job, kind = %err.kind(), error = %err, "cycle failed")
        }
        ErrorKind::Transient => tracing::warn!(job, kind = %err.kind(), error = %err, "cycle failed"),
        ErrorKind::KnownBenign => tracing::info!(job, error = %err, "cycle ended early"),
    }
}

/// Run `job` every `schedule.interval` until shutdown. Cycles never overlap:
/// a slow cycle delays the next tick instead of queueing more.
///
/// `on_cycle` receives the report of each successful cycle, or `None` when
/// the cycle failed or timed out.
pub async fn run_job<J, F>(
    mut job: J,
    schedule: Schedule,
    mut shutdown: broadcast::Receiver<()>,
    mut on_cycle: F,
) where
    J: Cronjob,
    F: FnMut(&str, Option<&JobReport>) + Send,
{
    let mut interval = tokio::time::interval(schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                tracing::info!(job = job.name(), "job shutting down");
                break;
            }
            _ = interval.tick() => {
                match tokio::time::timeout(schedule.timeout, job.run_cycle()).await {
                    Ok(Ok(report)) => {
                        if !report.is_idle() {
                            tracing::debug!(
                                job = job.name(),
                                epochs = report.epochs,
                                submitted = report.submitted,
                                benign = report.benign,
                                "cycle complete"
                            );
                        }
                        on_cycle(job.name(), Some(&report));
                    }
                    Ok(Err(err)) => {
                        log_failure(job.name(), &err);
                        on_cycle(job.name(), None);
                    }
                    Err(_) => {
                        tracing::warn!(job = job.name(), timeout_secs = schedule.timeout.as_secs(), "cycle timed out");
                        on_cycle(job.name(), None);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct Counting {
        runs: Arc<AtomicU64>,
        fail: bool,
    }

    #[async_trait]
    impl Cronjob for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run_cycle(&mut self) -> Result<JobReport, CronjobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CronjobError::Config("boom".into()));
            }
            Ok(JobReport {
                epochs: 1,
                ..JobReport::default()
            })
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn runs_until_shutdown() {
        let runs = Arc::new(AtomicU64::new(0));
        let reports = Arc::new(AtomicU64::new(0));
        let (tx, rx) = broadcast::channel(1);
        let job = Counting {
            runs: runs.clone(),
            fail: false,
        };
        let seen = reports.clone();
        let handle = tokio::spawn(run_job(job, schedule(), rx, move |_, report| {
            if report.is_some() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        let runs = runs.load(Ordering::SeqCst);
        assert!(runs >= 1);
        assert_eq!(reports.load(Ordering::SeqCst), runs);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        let runs = Arc::new(AtomicU64::new(0));
        let (tx, rx) = broadcast::channel(1);
        let job = Counting {
            runs: runs.clone(),
            fail: true,
        };
        let handle = tokio::spawn(run_job(job, schedule(), rx, |_, report| {
            assert!(report.is_none());
        }));

        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
