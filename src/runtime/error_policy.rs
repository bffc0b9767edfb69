//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::events::{actions, reasons};
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::CustomSecret;
use crate::observability;
use kube::runtime::events::EventType;
use kube::Resource;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing `CustomSecret` does
/// not delay retries of the others.
pub fn handle_reconciliation_error(
    obj: Arc<CustomSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    if let ReconcilerError::Cancelled(_) = error {
        debug!(
            resource.name = name,
            resource.namespace = namespace,
            "Reconciliation cancelled by shutdown"
        );
        return Action::await_change();
    }

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error.kind = error.kind(),
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    observability::metrics::increment_reconciliation_errors();

    let (backoff_seconds, error_count) = ctx.next_backoff(&format!("{namespace}/{name}"));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, next attempt at {})",
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    let events = Arc::clone(&ctx.events);
    let resource_ref = obj.object_ref(&());
    let note = error.to_string();
    tokio::spawn(async move {
        events
            .publish(
                &resource_ref,
                EventType::Warning,
                reasons::RECONCILE_FAILED,
                actions::RECONCILE,
                Some(note),
            )
            .await;
    });

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Classification of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    NotFound,
    Unauthorized,
    Expired,
    TooManyRequests,
    Other,
}

impl WatchErrorKind {
    /// Classify the debug rendering of a controller stream error
    pub fn classify(error_string: &str) -> Self {
        // 404 first: a plain-text 404 body surfaces as a serde error inside WatchFailed
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        if is_not_found {
            Self::NotFound
        } else if error_string.contains("401") || error_string.contains("Unauthorized") {
            Self::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            Self::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            Self::TooManyRequests
        } else {
            Self::Other
        }
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match WatchErrorKind::classify(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!("Verify the ClusterRole still grants list/watch on customsecrets and secrets:");
            error!(
                "  kubectl auth can-i watch customsecrets.api.example.com --as=system:serviceaccount:<namespace>:custom-secret-controller --all-namespaces"
            );
            warn!(
                "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!(
                "Watch resource version expired (410) - this is normal during pod restarts, watch will restart"
            );
            None
        }
        WatchErrorKind::TooManyRequests => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms before restart...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            let new_backoff = std::cmp::min(current_backoff.saturating_mul(2), max_backoff_ms);
            backoff.store(new_backoff, Ordering::Relaxed);
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - normal when an object was deleted; check the CustomSecret CRD is installed if this repeats. Error: {}",
                error_string
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found_wins_over_watch_failed() {
        assert_eq!(
            WatchErrorKind::classify("WatchFailed(SerdeError(invalid type: integer `404`))"),
            WatchErrorKind::NotFound
        );
    }

    #[test]
    fn test_classify_watch_errors() {
        assert_eq!(
            WatchErrorKind::classify("Api(ErrorResponse { code: 401, reason: \"Unauthorized\" })"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            WatchErrorKind::classify("too old resource version: 123 (456)"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            WatchErrorKind::classify("storage is (re)initializing"),
            WatchErrorKind::TooManyRequests
        );
        assert_eq!(
            WatchErrorKind::classify("connection reset by peer"),
            WatchErrorKind::Other
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_requests_doubles_backoff_up_to_max() {
        let backoff = Arc::new(AtomicU64::new(600));
        let result = handle_watch_stream_error("429 TooManyRequests", &backoff, 1_000, 1).await;
        assert_eq!(result, None);
        assert_eq!(backoff.load(Ordering::Relaxed), 1_000);
    }

    #[tokio::test]
    async fn test_not_found_continues_stream() {
        let backoff = Arc::new(AtomicU64::new(100));
        let result = handle_watch_stream_error("ObjectNotFound", &backoff, 1_000, 1).await;
        assert_eq!(result, Some(()));
        assert_eq!(backoff.load(Ordering::Relaxed), 100);
    }
}
