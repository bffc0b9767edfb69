//! # Runtime
//!
//! Controller bootstrap and the watch loop.
//!
//! - `initialization`: rustls, tracing, metrics, probe server, Kubernetes client
//! - `watch_loop`: kube-runtime `Controller` over `CustomSecret` and owned `Secret`s
//! - `error_policy`: per-resource backoff for failed passes and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
