//! One harvest pass: primary source, enrichment, discovery merge.

use chrono::{Datelike, NaiveDate};

use crate::error::{AppError, Result};
use crate::models::{Config, Event};
use crate::services::adapters::{self, DiscoveryClient};
use crate::services::{dedupe_events, enrich_all, merge};
use crate::utils::http::Fetcher;

/// Which primary source to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HarvestMode {
    /// Syndication feed of all upcoming events
    #[default]
    Feed,
    /// Monthly archive pages, this month and the following `n - 1`
    Months(u32),
    /// A single listing page
    Url(String),
}

/// Options for one harvest pass.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub mode: HarvestMode,
    pub enrich: bool,
    pub discovery: bool,
    pub workers: usize,
}

impl HarvestOptions {
    /// Feed harvest with enrichment and discovery as configured.
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: HarvestMode::Feed,
            enrich: config.enrichment.enabled,
            discovery: config.sources.discovery_enabled,
            workers: config.enrichment.workers,
        }
    }
}

/// Events from one harvest and where they came from.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub events: Vec<Event>,
    pub source_url: String,
}

/// Last month covered by a `months` harvest starting at `today`.
fn last_month(today: NaiveDate, months: u32) -> Option<NaiveDate> {
    let index = today.year() * 12 + today.month0() as i32 + months as i32 - 1;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}

async fn primary(
    fetcher: &dyn Fetcher,
    config: &Config,
    mode: &HarvestMode,
    today: NaiveDate,
) -> Result<Harvest> {
    match mode {
        HarvestMode::Feed => {
            let url = &config.sources.feed_url;
            log::info!("Fetching upcoming events feed {}", url);
            let xml = fetcher.fetch(url).await?;
            Ok(Harvest {
                events: adapters::parse_feed(&xml, url),
                source_url: url.clone(),
            })
        }
        HarvestMode::Months(months) => {
            if *months == 0 {
                return Err(AppError::validation("months must be at least 1"));
            }
            let end = last_month(today, *months)
                .ok_or_else(|| AppError::validation("month range out of bounds"))?;
            let base = &config.sources.archive_base_url;
            log::info!(
                "Scraping {} month(s) ({} → {})",
                months,
                today.format("%Y-%m"),
                end.format("%Y-%m")
            );
            Ok(Harvest {
                events: adapters::scrape_range(fetcher, base, today, end).await,
                source_url: format!("{base} (date range)"),
            })
        }
        HarvestMode::Url(url) => Ok(Harvest {
            events: adapters::scrape_page(fetcher, url).await?,
            source_url: url.clone(),
        }),
    }
}

/// Run one harvest pass.
///
/// A failure of the primary source is an error. Enrichment failures and a
/// failing discovery API only reduce what gets added.
pub async fn harvest(
    fetcher: &dyn Fetcher,
    config: &Config,
    options: &HarvestOptions,
    today: NaiveDate,
) -> Result<Harvest> {
    let Harvest {
        mut events,
        source_url,
    } = primary(fetcher, config, &options.mode, today).await?;
    log::info!("Primary source yielded {} events", events.len());

    if options.enrich && !events.is_empty() {
        log::info!(
            "Enriching {} events with {} workers",
            events.len(),
            options.workers
        );
        events = enrich_all(fetcher, events, options.workers).await;
    }

    if options.discovery {
        let client = DiscoveryClient::new(&config.sources);
        match client.fetch_all(fetcher, today).await {
            Ok(discovered) => {
                let before = events.len();
                let offered = discovered.len();
                events = merge(events, discovered);
                let added = events.len() - before;
                log::info!(
                    "Added {} discovery events ({} duplicates removed)",
                    added,
                    offered - added
                );
            }
            Err(e) => log::warn!("Discovery API unavailable: {}", e),
        }
    }

    Ok(Harvest {
        events: dedupe_events(events),
        source_url,
    })
}
