//! Scheduler error types.
//!
//! Only misuse surfaces here. Expected races (stale release, heartbeat from
//! an evicted client) are reported through outcome values instead.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while constructing a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{tier} budget must be greater than zero")]
    ZeroBudget { tier: &'static str },

    #[error("liveness timeout must be greater than zero")]
    ZeroLiveness,

    #[error("liveness timeout {liveness:?} must be shorter than the {tier} budget {budget:?}")]
    LivenessNotShorter {
        tier: &'static str,
        liveness: Duration,
        budget: Duration,
    },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
