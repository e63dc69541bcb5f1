//! Epoch arithmetic shared by every cronjob.

use std::ops::RangeInclusive;

use attest_types::Timestamp;

use crate::CronjobError;

/// Epoch `n` covers `[start + n·period, start + (n+1)·period)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochConfig {
    start: Timestamp,
    period_secs: u64,
}

impl EpochConfig {
    pub fn new(start: Timestamp, period_secs: u64) -> Result<Self, CronjobError> {
        if period_secs == 0 {
            return Err(CronjobError::Config("epoch period must be positive".into()));
        }
        Ok(Self { start, period_secs })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }

    /// Epoch containing `t`, or `None` before the first epoch starts.
    pub fn epoch_index(&self, t: Timestamp) -> Option<u64> {
        if t < self.start {
            return None;
        }
        Some(t.saturating_sub(self.start) / self.period_secs)
    }

    /// Half-open time range of `epoch`.
    pub fn time_range(&self, epoch: u64) -> (Timestamp, Timestamp) {
        let offset = epoch.saturating_mul(self.period_secs);
        let from = self.start.plus_secs(offset);
        (from, from.plus_secs(self.period_secs))
    }

    /// The most recent epoch that has fully elapsed at `now`.
    pub fn last_elapsed(&self, now: Timestamp) -> Option<u64> {
        self.epoch_index(now)?.checked_sub(1)
    }
}

/// Epochs still owed by a job whose next epoch is `next`, up to `end`.
pub fn owed_range(next: u64, end: u64) -> Option<RangeInclusive<u64>> {
    (end >= next).then_some(next..=end)
}
