//! Pod Volume Controller
//!
//! Keeps local caches of Pods and PersistentVolumeClaims in sync with the
//! cluster and reports which claims every pod mounts.

mod config;
mod controller;
mod error;
mod handlers;
mod recorder;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::recorder::TracingRecorder;
use controller::Controller;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls backend needs a process-wide crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting Pod Volume Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!(
        "  Namespace: {}",
        config.namespace.as_deref().unwrap_or("all namespaces")
    );
    info!(
        "  API server: {}",
        config.master_url.as_deref().unwrap_or("inferred")
    );
    info!("  Resync period: {:?}", config.informer.resync_period);
    info!("  Shutdown grace: {:?}", config.shutdown_grace);

    let client = config.kube_client().await?;
    let recorder = Arc::new(TracingRecorder::new(config.component()));
    let controller = Controller::new(client, &config, recorder)?;

    let stop = CancellationToken::new();
    tokio::spawn(stop_on_signal(stop.clone()));

    controller.run(stop).await;
    Ok(())
}

/// Cancels `stop` on Ctrl-C or SIGTERM.
async fn stop_on_signal(stop: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received");
    stop.cancel();
}
