//! # Custom Resource Definitions
//!
//! CRD types for the CustomSecret controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `CustomSecret` specification and its bound checks
//! - `status.rs` - Status sub-resource written after each create/rotate

mod spec;
mod status;

pub use spec::{CustomSecret, CustomSecretSpec, SpecViolation};
pub use status::{format_rotation_time, CustomSecretStatus};
