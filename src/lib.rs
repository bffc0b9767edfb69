//! # Custom Secret Controller
//!
//! A Kubernetes controller that turns `CustomSecret` resources into generated
//! basic-auth `Secret`s and rotates their passwords on a schedule.
//!
//! ## Overview
//!
//! For every `CustomSecret` accepted by a registered credential profile the
//! controller:
//!
//! 1. **Creates** a `Secret` with the same namespace and name, holding the
//!    subject as `username` and a random hex `password`
//! 2. **Rotates** the password in place once `rotationIntervalSeconds` has
//!    elapsed since `status.lastRotationTime`
//! 3. **Records** the rotation time in the `CustomSecret` status
//!
//! Objects no profile accepts are skipped silently.
//!
//! ## Quick Start
//!
//! ```rust
//! use custom_secret_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
