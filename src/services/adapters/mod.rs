//! Source adapters.
//!
//! Each adapter turns already fetched content into normalized events and
//! removes its own duplicates before returning.

pub mod archive;
pub mod discovery;
pub mod feed;
pub mod html;
pub mod jsonld;

use scraper::Html;

pub use archive::{month_url, month_urls, parse_month, scrape_month, scrape_range};
pub use discovery::DiscoveryClient;
pub use feed::parse_feed;
pub use html::parse_html;
pub use jsonld::parse_jsonld;

use crate::error::Result;
use crate::models::Event;
use crate::utils::http::Fetcher;

/// Parse an arbitrary listing page: structured data first, then the generic
/// container strategies.
pub fn parse_listing(html: &str, source_url: &str) -> Vec<Event> {
    let document = Html::parse_document(html);
    let structured = jsonld::events_from_document(&document, source_url);
    if !structured.is_empty() {
        log::debug!("Structured data yielded {} events", structured.len());
        return structured;
    }
    html::events_from_document(&document, source_url)
}

/// Fetch one listing page and parse it with [`parse_listing`].
pub async fn scrape_page(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<Event>> {
    let body = fetcher.fetch(url).await?;
    Ok(parse_listing(&body, url))
}
