//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing,
//! metrics, server startup, and Kubernetes client setup.

use crate::config::{create_shared_config, LogFormat, SharedControllerConfig, SharedServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::controller::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
use crate::controller::reconciler::{
    CredentialReconciler, KubeCredentialStore, KubeDesiredStateStore, Reconciler,
};
use crate::controller::server::{start_server, ServerState};
use crate::crd::CustomSecret;
use crate::observability;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// HTTP server task, finishes after shutdown
    pub server_handle: tokio::task::JoinHandle<()>,
    pub controller_config: SharedControllerConfig,
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
/// - A startup summary of existing `CustomSecret` resources
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before any rustls use; fails only if a provider is already installed
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    let (controller_config, server_config) = create_shared_config();

    init_tracing(controller_config.read().await.log_format)?;
    if !provider_installed {
        debug!("rustls crypto provider was already installed");
    }

    info!("Starting Custom Secret Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let shutdown = CancellationToken::new();

    let server_state_clone = Arc::clone(&server_state);
    let server_shutdown = shutdown.clone();
    let server_port = server_config.read().await.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone, server_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle, server_config.clone()).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let reconciler = {
        let config = controller_config.read().await;
        let credentials = CredentialReconciler::new(
            Arc::new(KubeDesiredStateStore::new(
                client.clone(),
                config.field_manager.clone(),
            )),
            Arc::new(KubeCredentialStore::new(client.clone())),
        )
        .with_requeue_policy(config.requeue_policy);
        info!(
            requeue_policy = ?config.requeue_policy,
            max_concurrent = config.max_concurrent_reconciliations,
            "Reconciler configured"
        );

        let events: Arc<dyn EventPublisher> = if config.publish_events {
            Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME))
        } else {
            Arc::new(NoopEventPublisher)
        };

        Arc::new(Reconciler::new(credentials, events, &config, shutdown))
    };

    summarize_existing_resources(&Api::<CustomSecret>::all(client.clone())).await?;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        server_handle,
        controller_config,
        server_config,
    })
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("custom_secret_controller=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: SharedServerConfig,
) -> Result<()> {
    let config = server_config.read().await;
    let startup_timeout = config.startup_timeout();
    let poll_interval = config.poll_interval();
    drop(config);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Check the CRD is queryable and log existing resources per namespace
///
/// The controller reconciles them itself once the watch starts.
async fn summarize_existing_resources(custom_secrets: &Api<CustomSecret>) -> Result<()> {
    let list = custom_secrets
        .list(&ListParams::default())
        .await
        .context("CustomSecret CRD is not queryable; is it installed?")?;

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.metadata.namespace.clone().unwrap_or_default())
            .or_default()
            .push(item.metadata.name.clone().unwrap_or_default());
    }

    info!(
        total = list.items.len(),
        namespaces = by_namespace.len(),
        "Found existing CustomSecret resources"
    );
    for (namespace, mut names) in by_namespace {
        names.sort();
        info!(namespace = namespace.as_str(), "  {}", names.join(", "));
    }

    Ok(())
}
