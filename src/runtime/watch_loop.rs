//! # Watch Loop
//!
//! Controller watch loop that monitors `CustomSecret` resources, and the
//! `Secret`s they own, and triggers reconciliation when changes are detected.

use crate::config::SharedControllerConfig;
use crate::constants::{CONTROLLER_NAME, MANAGED_BY_LABEL};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::CustomSecret;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the controller watch loop
///
/// Watches `CustomSecret` resources in all namespaces and the managed
/// `Secret`s they own, so deleting a credential re-triggers its creation.
/// Restarts the watch when the stream ends and returns once `shutdown`
/// has been cancelled.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    let shutdown = reconciler.shutdown.clone();
    spawn_signal_handler(shutdown.clone(), Arc::clone(&server_state));

    let config = controller_config.read().await;
    let backoff_start_ms = config.backoff_min_secs.saturating_mul(1_000);
    let max_concurrent = config.max_concurrent_reconciliations;
    drop(config);

    let backoff_duration_ms = Arc::new(AtomicU64::new(backoff_start_ms));
    let owned_selector = format!("{MANAGED_BY_LABEL}={CONTROLLER_NAME}");

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff_clone = Arc::clone(&backoff_duration_ms);
        let controller_config_for_filter = controller_config.clone();
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!("Starting controller watch loop...");
        let controller_future = Controller::new(
            Api::<CustomSecret>::all(client.clone()),
            watcher::Config::default().any_semantic(),
        )
        .owns(
            Api::<Secret>::all(client.clone()),
            watcher::Config::default().labels(&owned_selector),
        )
        .with_config(controller::Config::default().concurrency(max_concurrent))
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(
            reconcile,
            |obj, error, ctx| handle_reconciliation_error(obj, error, ctx),
            Arc::clone(&reconciler),
        )
        .filter_map(move |x| {
            let backoff = Arc::clone(&backoff_clone);
            let config_clone = controller_config_for_filter.clone();
            async move {
                match &x {
                    Ok((obj_ref, _)) => {
                        let config = config_clone.read().await;
                        let backoff_start = config.backoff_min_secs.saturating_mul(1_000);
                        drop(config);
                        backoff.store(backoff_start, Ordering::Relaxed);
                        debug!(resource = %obj_ref, "watch.event.success");
                        Some(x)
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        let config = config_clone.read().await;
                        let max_backoff = config.backoff_max_secs.saturating_mul(1_000);
                        let watch_restart_delay = config.watch_restart_delay_secs;
                        drop(config);
                        handle_watch_stream_error(
                            &error_string,
                            &backoff,
                            max_backoff,
                            watch_restart_delay,
                        )
                        .await
                        .map(|()| x)
                    }
                }
            }
        })
        .for_each(|_| futures::future::ready(()));

        tracing::Instrument::instrument(controller_future, watch_span).await;

        if shutdown.is_cancelled() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.read().await.watch_restart_delay_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::select! {
            () = shutdown.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Cancel `shutdown` and mark the server not ready on SIGINT or SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken, server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.cancel();
        info!("Marked server as not ready, cancelling in-flight reconciliations");
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}, listening for SIGINT only", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
