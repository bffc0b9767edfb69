//! # Controller
//!
//! Core controller modules for the Custom Secret Controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `events`: Kubernetes Events for credential changes and failures
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod server;
