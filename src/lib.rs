// src/lib.rs

//! Event harvester library
//!
//! Harvests event listings from a syndication feed, a monthly archive,
//! generic listing pages and a discovery API, deduplicates and enriches
//! them, and serves keyword and temporal search over the result.

pub mod error;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{AppError, Result};
pub use models::{Config, Event, Snapshot, SnapshotDocument};
