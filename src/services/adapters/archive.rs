//! Monthly calendar archive adapter.
//!
//! Month pages live at `{base}{YYYY}/{MM}/`. Structured data is preferred;
//! otherwise list items pairing an event link with a `<time>` are scanned.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::models::Event;
use crate::services::adapters::jsonld;
use crate::services::dedup::dedupe_events;
use crate::utils::http::Fetcher;
use crate::utils::{absolutize, clean_opt, clean_text};

static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("valid li selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time").expect("valid time selector"));
/// Detail pages look like `/2026/02/28/190514/`.
static EVENT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d{4}/\d{2}/\d{2}/\d+/").expect("valid event path regex"));

/// Listing page URL for one month.
pub fn month_url(base_url: &str, year: i32, month: u32) -> String {
    format!("{}/{year}/{month:02}/", base_url.trim_end_matches('/'))
}

/// Month page URLs from `start`'s month through `end`'s month, inclusive.
pub fn month_urls(base_url: &str, start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let (mut year, mut month) = (start.year(), start.month());
    let mut urls = Vec::new();
    while (year, month) <= (end.year(), end.month()) {
        urls.push(month_url(base_url, year, month));
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    urls
}

/// Parse one month listing page.
pub fn parse_month(html: &str, page_url: &str) -> Vec<Event> {
    let document = Html::parse_document(html);

    let structured = jsonld::events_from_document(&document, page_url);
    if !structured.is_empty() {
        return structured;
    }

    let events = document.select(&LIST_ITEM).filter_map(|li| {
        let anchor = li.select(&ANCHOR).next()?;
        let href = anchor.value().attr("href")?;
        if !EVENT_PATH.is_match(href) {
            return None;
        }
        let title = clean_text(&anchor.text().collect::<String>())?;
        let start = li.select(&TIME).next().and_then(|t| {
            clean_opt(t.value().attr("datetime"))
                .or_else(|| clean_text(&t.text().collect::<String>()))
        });

        Some(Event {
            start,
            source: Some(page_url.to_string()),
            ..Event::new(title, absolutize(page_url, href))
        })
    });

    dedupe_events(events)
}

/// Fetch and parse one month.
pub async fn scrape_month(
    fetcher: &dyn Fetcher,
    base_url: &str,
    year: i32,
    month: u32,
) -> Result<Vec<Event>> {
    let url = month_url(base_url, year, month);
    let html = fetcher.fetch(&url).await?;
    Ok(parse_month(&html, &url))
}

/// Fetch every month in the range. Months that fail to load are logged and
/// skipped.
pub async fn scrape_range(
    fetcher: &dyn Fetcher,
    base_url: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Event> {
    let mut all = Vec::new();
    for url in month_urls(base_url, start, end) {
        log::info!("Fetching {}", url);
        match fetcher.fetch(&url).await {
            Ok(html) => all.extend(parse_month(&html, &url)),
            Err(e) => log::warn!("Could not fetch {}: {}", url, e),
        }
    }
    dedupe_events(all)
}
