//! Zeno CRM server.
//!
//! Serves the segmentation, campaign and ingestion API and runs the
//! dispatch worker in the same process.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zeno::dispatch::channel;
use zeno::{build_router, AppState, Config, DispatchWorker, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("crm_server_starting");

    let config = Config::from_env();
    let vendor = if config.vendor_api_url.is_some() {
        "http"
    } else {
        "simulated"
    };
    info!(
        port = config.port,
        session_auth_configured = config.session_token.is_some(),
        receipt_signing_configured = config.receipt_signing_key.is_some(),
        vendor = vendor,
        dispatch_concurrency = config.dispatch_concurrency,
        await_dispatch = config.await_dispatch,
        combinator_policy = %config.combinator_policy,
        "config_loaded"
    );

    let store = Store::new();
    let delivery = channel::from_config(&config).context("Failed to build delivery channel")?;
    let (dispatcher, worker) = DispatchWorker::spawn(
        store.clone(),
        delivery,
        config.dispatch_concurrency,
        config.dispatch_queue_capacity,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = build_router(AppState::new(config, store.clone(), dispatcher));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "crm_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router held the last dispatch handle; let queued campaigns finish
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "dispatch_worker_join_failed");
    }

    store.close();

    info!("crm_server_shutdown_complete");

    Ok(())
}

/// Complete when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("crm_server_shutting_down");
}
