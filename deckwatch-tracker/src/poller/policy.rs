//! Interval policy
//!
//! Pure scheduling arithmetic: given the base interval of a target and the
//! outcome of its last poll, decide how long to wait before the next one, or
//! whether to stop. Kept free of timers and I/O so it can be tested directly.

use std::time::Duration;

use super::PollTarget;

/// Retry spacing after transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Keep polling at the base interval
    Fixed,
    /// Double the delay per consecutive failure, up to `max`
    Exponential { max: Duration },
}

/// What the last poll of a target produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A snapshot arrived and the target is still moving
    Active,
    /// A snapshot arrived and the target reached a terminal state
    Settled,
    /// The request failed in a way that may clear up
    TransientFailure { consecutive: u32 },
    /// Not found, or rejected as invalid
    PermanentFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPolicy {
    /// No target polls more often than this
    pub min_interval: Duration,
    pub backoff: Backoff,
    /// List cadence once every listed job is terminal; `None` stops the list
    pub settled_interval: Option<Duration>,
    /// Consecutive transient failures before renderers are told
    pub max_transient_failures: u32,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            backoff: Backoff::Exponential {
                max: Duration::from_secs(30),
            },
            settled_interval: None,
            max_transient_failures: 5,
        }
    }
}

impl IntervalPolicy {
    /// Raises `interval` to the configured floor
    pub fn clamp(&self, interval: Duration) -> Duration {
        interval.max(self.min_interval)
    }

    /// Delay before the next poll of `target`, or `None` to stop polling it
    pub fn next_delay(
        &self,
        target: &PollTarget,
        base: Duration,
        outcome: PollOutcome,
    ) -> Option<Duration> {
        let base = self.clamp(base);

        match outcome {
            PollOutcome::Active => Some(base),
            PollOutcome::Settled => match target {
                PollTarget::Job(_) => None,
                PollTarget::List => self.settled_interval.map(|d| d.max(base)),
            },
            PollOutcome::TransientFailure { consecutive } => Some(self.backoff_delay(base, consecutive)),
            PollOutcome::PermanentFailure => None,
        }
    }

    /// Whether `consecutive` transient failures should become a notice
    pub fn should_report(&self, consecutive: u32) -> bool {
        consecutive >= self.max_transient_failures
    }

    fn backoff_delay(&self, base: Duration, consecutive: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential { max } => {
                // First failure retries at the base interval
                let doublings = consecutive.saturating_sub(1).min(16);
                base.saturating_mul(1 << doublings).min(max.max(base))
            }
        }
    }
}
