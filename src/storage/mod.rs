//! Snapshot persistence.
//!
//! The published snapshot is stored as one JSON document:
//!
//! ```text
//! {
//!   "scraped_at": "2026-04-08T15:00:00Z",
//!   "source_url": "https://events.unl.edu/upcoming/?format=rss&limit=-1",
//!   "count": 412,
//!   "events": [ ... ]
//! }
//! ```

pub mod guard;
pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SnapshotDocument;

// Re-export for convenience
pub use guard::OverwriteGuard;
pub use local::LocalStorage;

/// Trait for snapshot storage backends.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Load the persisted snapshot; `None` when nothing was saved yet.
    async fn load(&self) -> Result<Option<SnapshotDocument>>;

    /// Replace the persisted snapshot. Readers never see a partial write.
    async fn save(&self, document: &SnapshotDocument) -> Result<()>;
}
