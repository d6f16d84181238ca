//! Generic HTML listing adapter.
//!
//! Tries a fixed, ordered list of container strategies; the first one that
//! matches anything wins. When none match, every anchor pointing at an
//! event-looking path becomes a title-only record.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::models::Event;
use crate::services::dedup::dedupe_events;
use crate::utils::{absolutize, clean_opt, clean_text};

/// One way of locating event containers on a listing page.
#[derive(Debug)]
pub struct ContainerStrategy {
    pub name: &'static str,
    selector: Selector,
}

impl ContainerStrategy {
    fn new(name: &'static str, css: &'static str) -> Self {
        Self {
            name,
            selector: Selector::parse(css).expect("valid container selector"),
        }
    }

    /// Matching containers, or `None` when the strategy does not apply.
    fn apply<'a>(&self, document: &'a Html) -> Option<Vec<ElementRef<'a>>> {
        let nodes: Vec<ElementRef<'a>> = document.select(&self.selector).collect();
        (!nodes.is_empty()).then_some(nodes)
    }
}

/// Strategies in the order they are tried.
pub static STRATEGIES: LazyLock<Vec<ContainerStrategy>> = LazyLock::new(|| {
    vec![
        ContainerStrategy::new("article", "article.event"),
        ContainerStrategy::new("card", ".event-card"),
        ContainerStrategy::new("list", ".events-list .event"),
        ContainerStrategy::new("list-item", "li.event"),
        ContainerStrategy::new("hcalendar", ".vevent"),
    ]
});

static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1 a, h2 a, h3 a, .event-title a, .summary a").expect("valid title selector")
});
static TITLE_PLAIN: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, .event-title, .summary").expect("valid title selector")
});
static TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time").expect("valid time selector"));
static LOCATION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".location, .event-location, .where").expect("valid location selector")
});
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".description, .summary, p").expect("valid description selector")
});
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

const EVENT_PATH_MARKERS: [&str; 2] = ["/event/", "/events/"];

/// Extract events from an already parsed listing page.
pub fn events_from_document(document: &Html, source_url: &str) -> Vec<Event> {
    let matched = STRATEGIES
        .iter()
        .find_map(|strategy| strategy.apply(document).map(|nodes| (strategy.name, nodes)));

    let events: Vec<Event> = match matched {
        Some((name, nodes)) => {
            log::debug!(
                "Container strategy '{}' matched {} nodes on {}",
                name,
                nodes.len(),
                source_url
            );
            nodes
                .into_iter()
                .filter_map(|node| parse_container(node, source_url))
                .collect()
        }
        None => scan_event_links(document, source_url),
    };

    dedupe_events(events)
}

/// Extract events from a listing page's markup.
pub fn parse_html(html: &str, source_url: &str) -> Vec<Event> {
    events_from_document(&Html::parse_document(html), source_url)
}

fn text_of(el: ElementRef) -> Option<String> {
    clean_text(&el.text().collect::<String>())
}

fn parse_container(node: ElementRef, source_url: &str) -> Option<Event> {
    let title_link = node.select(&TITLE_LINK).next();
    let title = title_link
        .and_then(text_of)
        .or_else(|| node.select(&TITLE_PLAIN).next().and_then(text_of))?;

    let url = title_link
        .and_then(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| absolutize(source_url, href))
        .unwrap_or_else(|| source_url.to_string());

    let start = node
        .select(&TIME)
        .next()
        .and_then(|t| clean_opt(t.value().attr("datetime")));

    Some(Event {
        title,
        url,
        start,
        location: node.select(&LOCATION).next().and_then(text_of),
        description: node.select(&DESCRIPTION).next().and_then(text_of),
        source: Some(source_url.to_string()),
        ..Event::default()
    })
}

fn scan_event_links(document: &Html, source_url: &str) -> Vec<Event> {
    document
        .select(&ANCHOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !EVENT_PATH_MARKERS.iter().any(|m| href.contains(m)) {
                return None;
            }
            Some(Event {
                source: Some(source_url.to_string()),
                ..Event::new(text_of(a)?, absolutize(source_url, href))
            })
        })
        .collect()
}
