// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod event;
mod range;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, EnrichmentConfig, ExtractorConfig, ExtractorProvider, HttpConfig, RefreshConfig,
    SearchConfig, ServerConfig, SourcesConfig,
};
pub use event::Event;
pub use range::{DateRange, TimeRange};
pub use snapshot::{Snapshot, SnapshotDocument};
