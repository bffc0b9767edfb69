//! # Rotation Decision
//!
//! Decides whether an existing credential is due for regeneration.
//!
//! The interval is whole seconds and the comparison is strict: a credential
//! rotated at `T` with interval `R` is due only once `now - T > R`.
//! A `lastRotationTime` in the future (clock skew between the writer and
//! this process) counts as zero elapsed time.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock reading the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time elapsed since `last_rotation`, clamped at zero
pub fn elapsed_since(last_rotation: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - last_rotation).to_std().unwrap_or(Duration::ZERO)
}

/// Whether the elapsed time since `last_rotation` strictly exceeds `interval`
pub fn is_rotation_due(last_rotation: DateTime<Utc>, interval: Duration, now: DateTime<Utc>) -> bool {
    elapsed_since(last_rotation, now) > interval
}

/// Time left until the credential becomes due, zero once it is
pub fn time_until_rotation(
    last_rotation: DateTime<Utc>,
    interval: Duration,
    now: DateTime<Utc>,
) -> Duration {
    interval.saturating_sub(elapsed_since(last_rotation, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_not_due_before_interval() {
        let now = t0() + chrono::Duration::seconds(30);
        assert!(!is_rotation_due(t0(), Duration::from_secs(60), now));
        assert_eq!(
            time_until_rotation(t0(), Duration::from_secs(60), now),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_exactly_at_interval_is_not_due() {
        let now = t0() + chrono::Duration::seconds(60);
        assert!(!is_rotation_due(t0(), Duration::from_secs(60), now));
        assert_eq!(
            time_until_rotation(t0(), Duration::from_secs(60), now),
            Duration::ZERO
        );
    }

    #[test]
    fn test_due_just_past_interval() {
        let now = t0() + chrono::Duration::seconds(60) + chrono::Duration::milliseconds(1);
        assert!(is_rotation_due(t0(), Duration::from_secs(60), now));
        assert_eq!(
            time_until_rotation(t0(), Duration::from_secs(60), now),
            Duration::ZERO
        );
    }

    #[test]
    fn test_future_rotation_time_counts_as_zero_elapsed() {
        let last = t0() + chrono::Duration::seconds(600);
        assert_eq!(elapsed_since(last, t0()), Duration::ZERO);
        assert!(!is_rotation_due(last, Duration::from_secs(1), t0()));
        assert_eq!(
            time_until_rotation(last, Duration::from_secs(60), t0()),
            Duration::from_secs(60)
        );
    }
}
