//! HTTP search surface.
//!
//! - `GET /health` -- readiness and refresh status
//! - `GET /events` -- the published snapshot
//! - `POST /reload` -- start a background refresh
//! - `GET /search` -- ranked keyword and temporal search

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::pipeline::{Refresher, SnapshotStore};
use crate::services::SearchEngine;

/// Shared state behind every handler.
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub refresher: Arc<Refresher>,
    pub engine: SearchEngine,
    pub interval_secs: u64,
}

impl AppState {
    pub fn new(refresher: Arc<Refresher>, engine: SearchEngine) -> Self {
        Self {
            store: Arc::clone(refresher.store()),
            interval_secs: refresher.config().refresh.interval_secs,
            refresher,
            engine,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(handlers::events))
        .route("/reload", post(handlers::reload))
        .route("/search", get(handlers::search))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(bind: &str, state: Arc<AppState>, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::config(format!("bind failed on {bind}: {e}")))?;
    log::info!("Listening on {}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
