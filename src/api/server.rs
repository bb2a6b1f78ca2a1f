use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, decompression::RequestDecompressionLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::{
    services::{
        cancel_batch, create_batch, generate_presigned_pair, generate_presigned_url, get_batch,
        health, list_batches, metrics, retry_batch,
    },
    state::AppState,
};
use crate::batch::{BatchService, HttpBatchClient, InMemoryBatchService};
use crate::config::Config;
use crate::storage::CredentialChain;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How `batchgate server` was invoked
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// Overrides `server.bind_addr`
    pub address: Option<SocketAddr>,
    /// Overrides `BATCHGATE_CONFIG`
    pub config_path: Option<PathBuf>,
    /// Serve batches from memory instead of the remote service
    pub fake_upstream: bool,
}

/// The `/api` surface with its middleware stack
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/metrics", get(metrics))
        .route("/api/generate-presigned-urls", post(generate_presigned_url))
        .route("/api/generate-presigned-urls/pair", post(generate_presigned_pair))
        .route("/api/batches", get(list_batches).post(create_batch))
        .route("/api/batches/{id}", get(get_batch))
        .route("/api/batches/{id}/retry", post(retry_batch))
        .route("/api/batches/{id}/cancel", post(cancel_batch))
        .with_state(state)
        // Transparently inflate gzip request bodies
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn run(options: ServeOptions) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = match options.config_path {
        Some(path) => Config::load_with_file(path),
        None => Config::load(),
    }
    .map_err(|e| format!("Failed to load config: {e}"))?;

    let batch: Arc<dyn BatchService> = if options.fake_upstream {
        warn!("Serving batches from memory; nothing is sent to the batch service");
        Arc::new(InMemoryBatchService::new())
    } else {
        info!(base_url = %config.batch.base_url, v2_mode = config.batch.v2_mode, "Using batch service");
        Arc::new(
            HttpBatchClient::new(&config.batch)
                .map_err(|e| format!("Failed to build batch client: {e}"))?,
        )
    };

    let default_credentials = Arc::new(CredentialChain::default_for(&config.storage));
    let address = options.address.unwrap_or(config.server.bind_addr);
    let bucket = config.storage.bucket.clone();
    let max_body = config.server.max_body_bytes;

    let state = AppState::new(config, batch, default_credentials)
        .map_err(|e| format!("Invalid batch defaults: {e}"))?;
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, %bucket, %max_body, "batchgate listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
