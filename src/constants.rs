//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name reported as field manager, event reporter and `managed-by` label value
pub const CONTROLLER_NAME: &str = "custom-secret-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Requeue delay used by the fixed requeue strategy for credentials that are not yet due
pub const DEFAULT_FIXED_REQUEUE_SECS: u64 = 5;

/// Slack added to the precise requeue delay so the next pass observes
/// `elapsed > interval` rather than `elapsed == interval`
pub const ROTATION_REQUEUE_SLACK_SECS: u64 = 1;

/// Fibonacci backoff lower bound for failed passes (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Fibonacci backoff upper bound for failed passes (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default cap on concurrently running reconciliation passes
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Bounds of the `CustomSecret` spec, part of the published schema
pub const SUBJECT_MIN_LEN: usize = 1;
pub const SUBJECT_MAX_LEN: usize = 63;
pub const SECRET_LENGTH_MIN: u32 = 1;
pub const SECRET_LENGTH_MAX: u32 = 100;
pub const ROTATION_INTERVAL_MIN_SECS: u32 = 1;
pub const ROTATION_INTERVAL_MAX_SECS: u32 = 86_400;

/// Secret data key holding the subject (principal name)
pub const USERNAME_KEY: &str = "username";

/// Secret data key holding the generated value
pub const PASSWORD_KEY: &str = "password";

/// Label stamped on every credential this controller creates
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
