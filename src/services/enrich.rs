//! Detail-page enrichment.
//!
//! Visits each event's own page and fills `image_url`, `group` and
//! `audience` when the adapter left them unset.

use std::sync::LazyLock;

use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::Event;
use crate::services::adapters::jsonld::{LdNode, ld_nodes};
use crate::utils::http::Fetcher;
use crate::utils::{clean_text, html_to_text};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid anchor selector"));
static AUDIENCE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href*="audience="]"#).expect("valid audience selector")
});
static ORIGINATED_IN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)originated in").expect("valid originated regex"));

/// Fields recovered from one detail page.
#[derive(Debug, Default, PartialEq)]
pub struct PageDetails {
    pub image_url: Option<String>,
    pub group: Option<String>,
    pub audience: Option<Vec<String>>,
}

impl PageDetails {
    /// Fill the event's unset fields from these details.
    pub fn apply_to(self, event: &mut Event) {
        if event.image_url.is_none() {
            event.image_url = self.image_url;
        }
        if event.group.is_none() {
            event.group = self.group;
        }
        if event.audience.is_none() {
            event.audience = self.audience;
        }
    }
}

/// Extract enrichment fields from a detail page.
pub fn parse_details(html: &str) -> PageDetails {
    let document = Html::parse_document(html);

    let image_url = ld_nodes(&document)
        .iter()
        .find(|node| node.is_event())
        .and_then(LdNode::image_url)
        .and_then(|raw| clean_text(&html_to_text(raw)))
        .map(|img| match img.strip_prefix("//") {
            Some(rest) => format!("https://{rest}"),
            None => img,
        });

    let group = document
        .root_element()
        .descendants()
        .filter(|node| {
            node.value()
                .as_text()
                .is_some_and(|t| ORIGINATED_IN.is_match(t))
        })
        .filter_map(|node| node.parent().and_then(ElementRef::wrap))
        .find_map(|parent| parent.select(&ANCHOR).next())
        .and_then(|link| clean_text(&link.text().collect::<String>()));

    let audience: Vec<String> = document
        .select(&AUDIENCE_LINK)
        .filter_map(|a| clean_text(&a.text().collect::<String>()))
        .collect();

    PageDetails {
        image_url,
        group,
        audience: (!audience.is_empty()).then_some(audience),
    }
}

/// Enrich one event. Failures leave the event as it was.
pub async fn enrich_event(fetcher: &dyn Fetcher, mut event: Event) -> Event {
    match fetcher.fetch(&event.url).await {
        Ok(html) => parse_details(&html).apply_to(&mut event),
        Err(e) => log::debug!("Enrichment skipped for {}: {}", event.url, e),
    }
    event
}

/// Enrich every event with at most `workers` detail fetches in flight.
///
/// Returns exactly one event per input, in input order.
pub async fn enrich_all(fetcher: &dyn Fetcher, events: Vec<Event>, workers: usize) -> Vec<Event> {
    let total = events.len();
    let mut slots: Vec<Option<Event>> = vec![None; total];

    let mut stream = stream::iter(events.into_iter().enumerate())
        .map(|(index, event)| async move { (index, enrich_event(fetcher, event).await) })
        .buffer_unordered(workers.max(1));

    let mut done = 0;
    while let Some((index, event)) = stream.next().await {
        slots[index] = Some(event);
        done += 1;
        if done % 50 == 0 || done == total {
            log::info!("Enriched {}/{} events", done, total);
        }
    }

    slots.into_iter().flatten().collect()
}
