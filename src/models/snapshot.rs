//! Published event snapshot and its on-disk document shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Event;

/// Immutable set of events captured by one harvest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// When the harvest finished; `None` until the first harvest or restore
    pub scraped_at: Option<DateTime<Utc>>,
    pub events: Vec<Event>,
}

impl Snapshot {
    /// Wrap freshly harvested events, stamped with the current time.
    pub fn capture(events: Vec<Event>) -> Self {
        Self {
            scraped_at: Some(Utc::now()),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Persisted form: `{scraped_at, source_url?, count, events}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub scraped_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    #[serde(default)]
    pub count: usize,

    #[serde(default)]
    pub events: Vec<Event>,
}

impl SnapshotDocument {
    pub fn from_snapshot(snapshot: &Snapshot, source_url: Option<String>) -> Self {
        Self {
            scraped_at: snapshot.scraped_at,
            source_url,
            count: snapshot.events.len(),
            events: snapshot.events.clone(),
        }
    }
}

impl From<SnapshotDocument> for Snapshot {
    fn from(doc: SnapshotDocument) -> Self {
        Self {
            scraped_at: doc.scraped_at,
            events: doc.events,
        }
    }
}
