//! Paginated discovery-API adapter.
//!
//! Pages the search endpoint with skip/take ordered by start time, keeping
//! events that end on or after a given day, until the reported total is
//! covered or a page comes back empty.

use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Event, SourcesConfig};
use crate::services::dedup::dedupe_events;
use crate::utils::http::Fetcher;
use crate::utils::{clean_opt, clean_text, html_to_text};

/// One page of search results.
#[derive(Debug, Deserialize)]
pub struct DiscoveryPage {
    #[serde(rename = "@odata.count", default)]
    pub odata_count: Option<usize>,

    #[serde(default)]
    pub count: Option<usize>,

    #[serde(default)]
    pub value: Option<Vec<DiscoveryItem>>,
}

impl DiscoveryPage {
    /// Total hit count; `@odata.count` wins over a plain `count`.
    pub fn total(&self) -> usize {
        self.odata_count.or(self.count).unwrap_or(0)
    }
}

/// A single search hit as returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryItem {
    pub id: Option<DiscoveryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub starts_on: Option<String>,
    pub ends_on: Option<String>,
    pub location: Option<String>,
    pub organization_name: Option<String>,
    #[serde(default)]
    pub category_names: Option<Vec<Option<String>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DiscoveryId {
    Number(u64),
    Text(String),
}

impl fmt::Display for DiscoveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryId::Number(n) => write!(f, "{n}"),
            DiscoveryId::Text(s) => f.write_str(s),
        }
    }
}

/// Endpoints and page size for the discovery API.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    search_url: String,
    event_base_url: String,
    image_base_url: String,
    source_url: String,
    page_size: usize,
}

impl DiscoveryClient {
    pub fn new(sources: &SourcesConfig) -> Self {
        Self {
            search_url: sources.discovery_search_url.clone(),
            event_base_url: sources.discovery_event_base_url.clone(),
            image_base_url: sources.discovery_image_base_url.clone(),
            source_url: sources.discovery_source_url.clone(),
            page_size: sources.discovery_page_size.max(1),
        }
    }

    /// Search URL for one page.
    pub fn page_url(&self, ends_after: NaiveDate, skip: usize) -> Result<String> {
        let url = Url::parse_with_params(
            &self.search_url,
            &[
                ("endsAfter", ends_after.format("%Y-%m-%d").to_string()),
                ("orderByField", "startsOn".to_string()),
                ("orderByDirection", "ascending".to_string()),
                ("status", "Approved".to_string()),
                ("take", self.page_size.to_string()),
                ("skip", skip.to_string()),
            ],
        )?;
        Ok(url.to_string())
    }

    /// Fetch every page of events ending on or after `today`.
    pub async fn fetch_all(&self, fetcher: &dyn Fetcher, today: NaiveDate) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let mut skip = 0;
        let mut total: Option<usize> = None;

        while total.is_none_or(|t| skip < t) {
            let url = self.page_url(today, skip)?;
            let body = fetcher.fetch(&url).await?;
            let page: DiscoveryPage = serde_json::from_str(&body)
                .map_err(|e| AppError::parse("discovery page", e))?;

            let total_count = *total.get_or_insert(page.total());
            let items = page.value.unwrap_or_default();
            if items.is_empty() {
                break;
            }

            events.extend(items.into_iter().filter_map(|item| self.to_event(item)));
            skip += self.page_size;
            log::info!(
                "Fetched {}/{} discovery events",
                skip.min(total_count),
                total_count
            );
        }

        Ok(dedupe_events(events))
    }

    /// Map one API item; items without a usable name are dropped.
    pub fn to_event(&self, item: DiscoveryItem) -> Option<Event> {
        let title = clean_opt(item.name.as_deref())?;

        let url = match &item.id {
            Some(id) => format!("{}{}", self.event_base_url, id),
            None => self.source_url.clone(),
        };
        let image_url = item
            .image_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("{}{}", self.image_base_url, p.trim()));
        let description = item
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .and_then(|d| clean_text(&html_to_text(d)));
        let audience: Vec<String> = item
            .category_names
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter(|c| !c.is_empty())
            .collect();

        Some(Event {
            title,
            url,
            start: item.starts_on,
            end: item.ends_on,
            location: clean_opt(item.location.as_deref()),
            description,
            group: clean_opt(item.organization_name.as_deref()),
            image_url,
            audience: (!audience.is_empty()).then_some(audience),
            source: Some(self.source_url.clone()),
        })
    }
}
