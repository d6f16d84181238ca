//! Request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SnapshotDocument;
use crate::server::AppState;
use crate::services::{SearchRequest, SearchResponse};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub events_loaded: usize,
    pub last_scraped: Option<DateTime<Utc>>,
    pub scrape_running: bool,
    pub scrape_interval_seconds: u64,
}

/// `GET /health`. 503 until a snapshot with events is published.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.load();
    let ready = !snapshot.is_empty();
    let body = HealthResponse {
        status: if ready { "ok" } else { "starting" },
        events_loaded: snapshot.len(),
        last_scraped: snapshot.scraped_at,
        scrape_running: state.store.is_running(),
        scrape_interval_seconds: state.interval_secs,
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// `GET /events`
pub async fn events(State(state): State<Arc<AppState>>) -> Json<SnapshotDocument> {
    let snapshot = state.store.load();
    Json(SnapshotDocument::from_snapshot(&snapshot, None))
}

/// `POST /reload`
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    state.refresher.trigger()?;
    log::info!("Refresh requested over HTTP");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "refresh started" })),
    ))
}

/// Raw query parameters. Typed values are parsed in the handler so bad input
/// gets the JSON error body instead of the extractor's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub top: Option<String>,
    pub no_llm: Option<String>,
    pub model: Option<String>,
}

fn parse_param<T: std::str::FromStr>(value: Option<&str>, name: &str) -> Result<Option<T>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse()
                .map_err(|_| AppError::invalid_query(format!("{name} has an invalid value: {v:?}")))
        })
        .transpose()
}

/// `GET /search`
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::invalid_query("q is required"))?;

    let top = parse_param::<usize>(params.top.as_deref(), "top")?;
    let no_llm = parse_param::<bool>(params.no_llm.as_deref(), "no_llm")?.unwrap_or(false);

    let request = SearchRequest {
        query,
        top,
        use_extractor: !no_llm,
        model: params.model.filter(|m| !m.trim().is_empty()),
    };

    // Held for the whole request so a concurrent publish cannot mix snapshots.
    let snapshot = state.store.load();
    let now = Local::now().naive_local();
    let response = state
        .engine
        .execute(&snapshot.events, &request, now)
        .await?;
    Ok(Json(response))
}
