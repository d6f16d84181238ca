//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Source adapters (`adapters`)
//! - Cross-source deduplication (`dedup`)
//! - Detail-page enrichment (`enrich`)
//! - Date and time-of-day resolution (`temporal`)
//! - Optional keyword extraction (`extractor`)
//! - Ranking and filtering (`search`)

pub mod adapters;
pub mod dedup;
pub mod enrich;
pub mod extractor;
pub mod search;
pub mod temporal;

pub use dedup::{dedupe_events, merge};
pub use enrich::enrich_all;
pub use extractor::{Extraction, KeywordExtractor, build_extractor};
pub use search::{SearchEngine, SearchHit, SearchRequest, SearchResponse};
pub use temporal::Resolution;
