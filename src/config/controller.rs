//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{process_env, var_or_default, var_or_default_bool, var_or_default_str};
use crate::constants::{
    CONTROLLER_NAME, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS,
    DEFAULT_FIXED_REQUEUE_SECS, DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
    DEFAULT_WATCH_RESTART_DELAY_SECS,
};
use crate::controller::reconciler::RequeuePolicy;
use std::time::Duration;

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// When to re-check a credential that is not yet due for rotation
    /// `REQUEUE_STRATEGY=precise` (default) or `fixed` with `FIXED_REQUEUE_SECS`
    pub requeue_policy: RequeuePolicy,
    /// Lower bound of the per-resource Fibonacci backoff after a failed pass (seconds)
    pub backoff_min_secs: u64,
    /// Upper bound of the per-resource Fibonacci backoff after a failed pass (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Maximum number of reconciliation passes running at once
    pub max_concurrent_reconciliations: u16,
    /// Field manager recorded on status patches
    pub field_manager: String,
    /// Publish Kubernetes Events for created/rotated credentials and failures
    pub publish_events: bool,
    /// Log output format (`json` or `text`)
    pub log_format: LogFormat,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue_policy: RequeuePolicy::Precise,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            field_manager: CONTROLLER_NAME.to_string(),
            publish_events: true,
            log_format: LogFormat::Json,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let fixed_requeue_secs =
            var_or_default(&lookup, "FIXED_REQUEUE_SECS", DEFAULT_FIXED_REQUEUE_SECS).max(1);
        let requeue_policy = match lookup("REQUEUE_STRATEGY")
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            Some("fixed") => RequeuePolicy::Fixed(Duration::from_secs(fixed_requeue_secs)),
            _ => RequeuePolicy::Precise,
        };

        let backoff_min_secs =
            var_or_default(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS).max(1);
        let backoff_max_secs =
            var_or_default(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS)
                .max(backoff_min_secs);

        Self {
            requeue_policy,
            backoff_min_secs,
            backoff_max_secs,
            watch_restart_delay_secs: var_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            max_concurrent_reconciliations: var_or_default(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            field_manager: var_or_default_str(&lookup, "FIELD_MANAGER", CONTROLLER_NAME),
            publish_events: var_or_default_bool(&lookup, "PUBLISH_EVENTS", true),
            log_format: LogFormat::parse(&var_or_default_str(&lookup, "LOG_FORMAT", "json")),
        }
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}
