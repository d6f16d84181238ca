//! Pipeline entry points for harvesting and publication.
//!
//! - `harvest`: One pass over the sources, producing a deduplicated event list
//! - `refresh`: Single-flight refresh cycle and the periodic loop around it

pub mod harvest;
pub mod refresh;
pub mod state;

pub use harvest::{Harvest, HarvestMode, HarvestOptions, harvest};
pub use refresh::{RefreshOutcome, Refresher, Trigger};
pub use state::{RefreshPermit, SnapshotStore};
