//! # Requeue Policy
//!
//! When to schedule the next pass after a successful one.

use crate::constants::ROTATION_REQUEUE_SLACK_SECS;
use std::time::Duration;

/// Scheduling strategy for credentials that exist and are not yet due
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequeuePolicy {
    /// Re-check when the credential becomes due, never later than one interval
    #[default]
    Precise,
    /// Re-check after a fixed delay regardless of the remaining time
    Fixed(Duration),
}

impl RequeuePolicy {
    /// Delay after a pass that found the credential current
    pub fn after_current(&self, remaining: Duration, interval: Duration) -> Duration {
        match self {
            Self::Precise => {
                (remaining + Duration::from_secs(ROTATION_REQUEUE_SLACK_SECS)).min(interval)
            }
            Self::Fixed(delay) => *delay,
        }
    }

    /// Delay after a pass that created or rotated the credential
    pub fn after_write(&self, interval: Duration) -> Duration {
        match self {
            Self::Precise => interval,
            Self::Fixed(delay) => *delay,
        }
    }
}
