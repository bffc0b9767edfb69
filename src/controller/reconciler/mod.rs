//! # Reconciler
//!
//! Core reconciliation logic for `CustomSecret` resources.
//!
//! The reconciler:
//! - Reads the `CustomSecret` and checks it against the registered credential profiles
//! - Creates the managed `Secret` when it is missing
//! - Regenerates the secret value once the rotation interval has passed
//! - Records the rotation time in the `CustomSecret` status
//!
//! ## Reconciliation Flow
//!
//! 1. Fetch the `CustomSecret` (gone: done)
//! 2. Qualify it against the profile registry (no match: skip)
//! 3. Fetch the managed `Secret` by the same namespace/name
//! 4. Create, rotate, or schedule the next check
//! 5. Write `status.lastRotationTime` after a create or rotate

pub mod generator;
pub mod profile;
pub mod reconcile;
pub mod requeue;
pub mod rotation;
pub mod store;
pub mod types;

// Re-export public API
pub use generator::{GenerationError, OsSecretGenerator, SecretGenerator};
pub use profile::{CredentialProfile, Disqualification, LengthRule, ProfileRegistry, SubjectRule};
pub use reconcile::{reconcile, CredentialReconciler, PassState, ReconcileOutcome};
pub use requeue::RequeuePolicy;
pub use rotation::{Clock, SystemClock};
pub use store::{
    CreateOutcome, CredentialStore, DesiredStateStore, KubeCredentialStore,
    KubeDesiredStateStore, ResourceKey, StoreError,
};
pub use types::{BackoffState, Reconciler, ReconcilerError};
