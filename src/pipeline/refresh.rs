//! Periodic refresh orchestrator.
//!
//! Idle → Running → Idle. A refresh harvests, swaps the new snapshot in and
//! persists it. A successful harvest always publishes, however small; a
//! failed one leaves the published snapshot untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, Snapshot, SnapshotDocument};
use crate::pipeline::harvest::{HarvestOptions, harvest};
use crate::pipeline::state::{RefreshPermit, SnapshotStore};
use crate::storage::SnapshotStorage;
use crate::utils::http::Fetcher;

/// What asked for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Timer tick; silently skipped while busy
    Scheduled,
    /// Explicit request; rejected while busy
    External,
}

/// How a refresh request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot with this many events was published
    Published(usize),
    /// Another refresh was already running
    Skipped,
}

/// Drives harvests and owns publication into the [`SnapshotStore`].
pub struct Refresher {
    store: Arc<SnapshotStore>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn SnapshotStorage>,
    config: Config,
}

impl Refresher {
    pub fn new(
        store: Arc<SnapshotStore>,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn SnapshotStorage>,
        config: Config,
    ) -> Self {
        Self {
            store,
            fetcher,
            storage,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the persisted snapshot into the store so reads work before the
    /// first live refresh. Missing or unreadable files are logged and skipped.
    pub async fn restore(&self) -> bool {
        match self.storage.load().await {
            Ok(Some(document)) => {
                let snapshot = Snapshot::from(document);
                log::info!("Restored {} events from disk", snapshot.len());
                self.store.publish(snapshot);
                true
            }
            Ok(None) => {
                log::info!("No persisted snapshot found");
                false
            }
            Err(e) => {
                log::warn!("Could not restore persisted snapshot: {}", e);
                false
            }
        }
    }

    /// Run one refresh if none is running.
    pub async fn refresh(&self, trigger: Trigger) -> Result<RefreshOutcome> {
        match self.store.try_begin() {
            Some(permit) => self.run_with(permit).await.map(RefreshOutcome::Published),
            None if trigger == Trigger::Scheduled => {
                log::info!("Refresh already in progress, skipping tick");
                Ok(RefreshOutcome::Skipped)
            }
            None => Err(AppError::RefreshInProgress),
        }
    }

    /// Start a refresh in the background. Fails immediately when one is
    /// already running.
    pub fn trigger(self: &Arc<Self>) -> Result<()> {
        let permit = self.store.try_begin().ok_or(AppError::RefreshInProgress)?;
        let refresher = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = refresher.run_with(permit).await {
                log::error!("Background refresh failed: {}", e);
            }
        });
        Ok(())
    }

    async fn run_with(&self, _permit: RefreshPermit) -> Result<usize> {
        let started = std::time::Instant::now();
        log::info!("Refresh started");

        let options = HarvestOptions::from_config(&self.config);
        let today = Local::now().date_naive();
        let result = harvest(self.fetcher.as_ref(), &self.config, &options, today).await?;

        let snapshot = Snapshot::capture(result.events);
        let count = snapshot.len();
        let document = SnapshotDocument::from_snapshot(&snapshot, Some(result.source_url));
        self.store.publish(snapshot);

        if let Err(e) = self.storage.save(&document).await {
            log::error!("Snapshot published but not persisted: {}", e);
        }

        log::info!(
            "Refresh finished: {} events in {:.1}s",
            count,
            started.elapsed().as_secs_f64()
        );
        Ok(count)
    }

    /// Restore, refresh once, then refresh on the configured interval until
    /// `cancel` fires. Cancellation is observed between cycles.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        self.restore().await;

        let period = Duration::from_secs(self.config.refresh.interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Refresh loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh(Trigger::Scheduled).await {
                        log::error!("Refresh failed, keeping previous snapshot: {}", e);
                    }
                }
            }
        }
    }
}
