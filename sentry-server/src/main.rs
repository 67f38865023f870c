//! Sentry Server - REST API for blacklisted image detection
//!
//! Endpoints:
//! - POST /scan - Scan an uploaded attachment
//! - GET  /references - Reference snapshot statistics
//! - POST /references - Add a reference image (admin)
//! - POST /references/rebuild - Re-index the reference directory (admin)
//! - GET  /health, GET /ready - Liveness and readiness checks

use std::net::SocketAddr;
use std::sync::Arc;

use sentry_core::{Sentry, SentryConfig};
use sentry_server::{create_router_with_config, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sentry_server=info,sentry_core=info,tower_http=info")
        }))
        .init();

    let config = Config::from_env();
    let sentry_config = SentryConfig::from_env();

    tracing::info!(
        dir = %sentry_config.reference_dir.display(),
        threshold = sentry_config.match_threshold,
        workers = sentry_config.worker_threads,
        "Starting sentry-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let sentry = Arc::new(Sentry::start(sentry_config).await?);

    let state = AppState::new(Arc::clone(&sentry))
        .with_admin_token(config.admin_token.clone())
        .with_max_file_size(config.max_file_size());

    if state.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set: reference endpoints are open");
    }

    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    match Arc::try_unwrap(sentry) {
        Ok(sentry) => sentry.shutdown(),
        Err(_) => tracing::warn!("Engine still referenced at exit, skipping pool shutdown"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
