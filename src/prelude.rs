//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use custom_secret_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, Clock, CreateOutcome, CredentialProfile, CredentialReconciler, CredentialStore,
    DesiredStateStore, GenerationError, PassState, ProfileRegistry, ReconcileOutcome, Reconciler,
    ReconcilerError, RequeuePolicy, ResourceKey, SecretGenerator, StoreError,
};

// Event publishing
pub use crate::controller::events::{EventPublisher, NoopEventPublisher};

// Config types
pub use crate::config::{
    ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig,
};
