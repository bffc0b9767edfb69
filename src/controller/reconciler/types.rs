//! # Types
//!
//! Error type of a reconciliation pass and the context shared with the
//! kube-runtime controller.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::EventPublisher;
use crate::controller::reconciler::generator::GenerationError;
use crate::controller::reconciler::reconcile::CredentialReconciler;
use crate::controller::reconciler::store::{ResourceKey, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("secret generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("{operation} for {key} failed: {source}")]
    Store {
        operation: &'static str,
        key: ResourceKey,
        #[source]
        source: StoreError,
    },
    #[error("reconciliation of {0} was cancelled")]
    Cancelled(ResourceKey),
    #[error("CustomSecret is missing metadata.{0}")]
    MissingMetadata(&'static str),
}

impl ReconcilerError {
    /// Short label used for the `reason` of warning events and in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation",
            Self::Store { .. } => "store",
            Self::Cancelled(_) => "cancelled",
            Self::MissingMetadata(_) => "metadata",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    pub last_failure: Instant,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            last_failure: Instant::now(),
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_failure = Instant::now();
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Context handed to every reconciliation by the controller runtime
pub struct Reconciler {
    pub credentials: CredentialReconciler,
    pub events: Arc<dyn EventPublisher>,
    // Backoff state per resource (identified by namespace/name), owned by
    // the error policy and reset after a successful pass
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    /// Cancelled on shutdown; in-flight passes abort their store calls
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("credentials", &self.credentials)
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        credentials: CredentialReconciler,
        events: Arc<dyn EventPublisher>,
        config: &ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            credentials,
            events,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
            shutdown,
        }
    }

    /// Record a failure for `resource_key`, returning the next backoff in
    /// seconds and the consecutive error count
    pub fn next_backoff(&self, resource_key: &str) -> (u64, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let stale_after = self.stale_backoff_after();
                states.retain(|key, state| {
                    key == resource_key || state.last_failure.elapsed() <= stale_after
                });
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| {
                        BackoffState::new(self.backoff_min_secs, self.backoff_max_secs)
                    });
                state.increment_error();
                (state.backoff.next_backoff_seconds(), state.error_count)
            }
            Err(e) => {
                warn!(
                    "Failed to lock backoff_states: {}, using minimum backoff",
                    e
                );
                (self.backoff_min_secs, 0)
            }
        }
    }

    /// Age after which a backoff entry no longer belongs to a live resource
    ///
    /// A resource that keeps failing is retried at least every
    /// `backoff_max_secs`. Entries idle for twice that long belong to objects
    /// that were deleted while failing, which the controller never reconciles
    /// again.
    fn stale_backoff_after(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs.max(1).saturating_mul(2))
    }

    /// Forget the failure history of `resource_key`
    pub fn reset_backoff(&self, resource_key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(resource_key);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }
}
