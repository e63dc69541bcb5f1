//! The periodic job capability and its per-cycle report.

use async_trait::async_trait;

use crate::CronjobError;

/// What one cycle of a job accomplished.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Epochs (or sampling rounds) completed.
    pub epochs: u64,
    /// Contract submissions or samples written.
    pub submitted: u64,
    /// Submissions rejected with a benign reason.
    pub benign: u64,
}

impl JobReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// A timer-driven job. The runner never starts a cycle while the previous
/// one is still running.
#[async_trait]
pub trait Cronjob: Send {
    fn name(&self) -> &str;

    async fn run_cycle(&mut self) -> Result<JobReport, CronjobError>;
}
