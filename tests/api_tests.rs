//! Integration tests for the HTTP search surface.
//!
//! Tests drive the `axum` router through `tower::ServiceExt` without binding
//! a socket.

#![cfg(feature = "server")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use event_harvester::models::{Config, Event, SearchConfig, Snapshot};
use event_harvester::pipeline::{Refresher, SnapshotStore};
use event_harvester::server::{AppState, router};
use event_harvester::services::SearchEngine;
use event_harvester::storage::LocalStorage;
use event_harvester::utils::http::MemoryFetcher;

const FEED_URL: &str = "https://events.example.edu/feed";

fn event(title: &str, group: &str, start: &str) -> Event {
    Event {
        start: Some(start.into()),
        group: Some(group.into()),
        ..Event::new(title, format!("https://events.example.edu/{}", title.replace(' ', "-")))
    }
}

fn make_state(dir: &TempDir, fetcher: MemoryFetcher) -> Arc<AppState> {
    let mut config = Config::default();
    config.sources.feed_url = FEED_URL.into();
    config.sources.discovery_enabled = false;
    config.enrichment.enabled = false;

    let refresher = Arc::new(Refresher::new(
        Arc::new(SnapshotStore::default()),
        Arc::new(fetcher),
        Arc::new(LocalStorage::new(dir.path().join("events.json"))),
        config,
    ));
    let engine = SearchEngine::new(SearchConfig::default(), None);
    Arc::new(AppState::new(refresher, engine))
}

fn seeded_state(dir: &TempDir) -> Arc<AppState> {
    let state = make_state(dir, MemoryFetcher::new());
    state.store.publish(Snapshot::capture(vec![
        event("Jazz Ensemble Concert", "School of Music", "2026-04-10T19:30:00-05:00"),
        event("Career Fair", "Career Services", "2026-04-11T10:00:00-05:00"),
        event("Pizza Night", "Student Union", "2026-04-12T20:00:00-05:00"),
    ]));
    state
}

async fn send(state: Arc<AppState>, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_starting() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(make_state(&dir, MemoryFetcher::new()), Method::GET, "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "starting");
    assert_eq!(body["events_loaded"], 0);
    assert!(body["last_scraped"].is_null());
    assert_eq!(body["scrape_running"], false);
    assert_eq!(body["scrape_interval_seconds"], 3600);
}

#[tokio::test]
async fn test_health_ok() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(seeded_state(&dir), Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["events_loaded"], 3);
    assert!(body["last_scraped"].is_string());
}

#[tokio::test]
async fn test_events_document() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(seeded_state(&dir), Method::GET, "/events").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["events"].as_array().unwrap().len(), 3);
    assert_eq!(body["events"][0]["title"], "Jazz Ensemble Concert");
}

#[tokio::test]
async fn test_search_ranks_by_field_weight() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(seeded_state(&dir), Method::GET, "/search?q=jazz%20music&top=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "jazz music");
    assert_eq!(body["terms"], serde_json::json!(["jazz", "music"]));
    assert_eq!(body["llm_used"], false);
    assert_eq!(body["total_searched"], 3);
    assert_eq!(body["count"], 1);
    // title (4) + group (3)
    assert_eq!(body["results"][0]["score"], 7);
    assert_eq!(body["results"][0]["title"], "Jazz Ensemble Concert");
    assert!(body["date_range"].is_null());
}

#[tokio::test]
async fn test_search_night_is_a_term() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(seeded_state(&dir), Method::GET, "/search?q=pizza+night&no_llm=true").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["terms"], serde_json::json!(["pizza", "night"]));
    assert!(body["time_range"].is_null());
    assert_eq!(body["results"][0]["title"], "Pizza Night");
}

#[tokio::test]
async fn test_search_no_terms_is_client_error() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(seeded_state(&dir), Method::GET, "/search?q=find+me+some+events").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("No usable search terms"));
}

#[tokio::test]
async fn test_search_rejects_bad_top() {
    let dir = TempDir::new().unwrap();
    let state = seeded_state(&dir);

    let (status, _) = send(Arc::clone(&state), Method::GET, "/search?q=jazz&top=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(state, Method::GET, "/search?q=jazz&top=101").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_non_numeric_top_is_json_error() {
    let dir = TempDir::new().unwrap();
    let state = seeded_state(&dir);

    let (status, body) = send(Arc::clone(&state), Method::GET, "/search?q=jazz&top=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("top"));

    let (status, body) = send(Arc::clone(&state), Method::GET, "/search?q=jazz&no_llm=maybe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = send(state, Method::GET, "/search?q=jazz&top=&no_llm=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_search_requires_query() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(seeded_state(&dir), Method::GET, "/search").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_reload_conflict_while_running() {
    let dir = TempDir::new().unwrap();
    let state = seeded_state(&dir);
    let _permit = state.store.try_begin().unwrap();

    let (status, body) = send(Arc::clone(&state), Method::POST, "/reload").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (_, health) = send(state, Method::GET, "/health").await;
    assert_eq!(health["scrape_running"], true);
}

#[tokio::test]
async fn test_reload_publishes_in_background() {
    let dir = TempDir::new().unwrap();
    let feed = "<rss version=\"2.0\"><channel><title>t</title>\
         <item><title>Astronomy Night</title><link>https://events.example.edu/a</link></item>\
         </channel></rss>";
    let state = make_state(&dir, MemoryFetcher::new().with_page(FEED_URL, feed));

    let (status, body) = send(Arc::clone(&state), Method::POST, "/reload").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "refresh started");

    for _ in 0..100 {
        if !state.store.is_running() && !state.store.load().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(state.store.load().events[0].title, "Astronomy Night");
    assert!(dir.path().join("events.json").exists());
}
