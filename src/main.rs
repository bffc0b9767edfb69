//! # Custom Secret Controller
//!
//! Entry point of the controller binary: initializes the runtime, runs the
//! watch loop until a shutdown signal arrives, then stops the probe server.

use anyhow::Result;
use custom_secret_controller::runtime::initialization::initialize;
use custom_secret_controller::runtime::watch_loop::run_watch_loop;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    let result = run_watch_loop(
        init.client.clone(),
        Arc::clone(&init.reconciler),
        Arc::clone(&init.server_state),
        init.controller_config.clone(),
    )
    .await;

    init.reconciler.shutdown.cancel();
    if let Err(e) = init.server_handle.await {
        error!("HTTP server task failed: {}", e);
    }

    info!("Custom Secret Controller exited");
    result
}
