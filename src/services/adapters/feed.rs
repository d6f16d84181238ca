//! Syndication feed adapter.
//!
//! Each item's description is an HTML fragment:
//!
//! ```text
//! <small><abbr class="dtstart" title="2026-04-10T19:00:00-05:00">Apr 10</abbr></small>
//! <small>7:00 pm</small>
//! <small>Kimball Recital Hall</small>
//! Free admission. School of MusicStatus: CONFIRMED | Concert |
//! ```
//!
//! The start/end come from the `dtstart`/`dtend` abbreviations, the location
//! from the trailing `<small>`, and the group from the title-cased words
//! glued onto the `Status:` marker.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::Event;
use crate::services::dedup::dedupe_events;
use crate::utils::{absolutize, clean_opt, clean_text};

static DTSTART: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("abbr.dtstart").expect("valid dtstart selector"));
static DTEND: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("abbr.dtend").expect("valid dtend selector"));
static SMALL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("small").expect("valid small selector"));
static GROUP_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][A-Za-z\s&'-]+)$").expect("valid group regex"));

const STATUS_MARKER: &str = "Status:";

/// Fields recovered from one item's description markup.
#[derive(Debug, Default, PartialEq)]
struct ItemDetails {
    start: Option<String>,
    end: Option<String>,
    location: Option<String>,
    description: Option<String>,
    group: Option<String>,
}

/// Parse a feed document into events.
///
/// Malformed input yields an empty list.
pub fn parse_feed(xml: &str, source_url: &str) -> Vec<Event> {
    let feed = match feed_rs::parser::parse(xml.as_bytes()) {
        Ok(feed) => feed,
        Err(e) => {
            log::warn!("Feed at {} could not be parsed: {}", source_url, e);
            return Vec::new();
        }
    };

    let events = feed.entries.into_iter().filter_map(|entry| {
        let title = clean_opt(entry.title.as_ref().map(|t| t.content.as_str()))?;

        let raw_link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();
        let url = if raw_link.is_empty() {
            source_url.to_string()
        } else {
            absolutize(source_url, &raw_link)
        };

        let details = entry
            .summary
            .as_ref()
            .map(|s| parse_description(&s.content))
            .unwrap_or_default();

        Some(Event {
            title,
            url,
            start: details.start,
            end: details.end,
            location: details.location,
            description: details.description,
            group: details.group,
            source: Some(source_url.to_string()),
            ..Event::default()
        })
    });

    dedupe_events(events)
}

fn parse_description(markup: &str) -> ItemDetails {
    let fragment = Html::parse_fragment(markup);
    let root = fragment.root_element();

    let abbr_title = |sel: &Selector| {
        root.select(sel)
            .next()
            .and_then(|el| clean_opt(el.value().attr("title")))
    };

    // Typically [date, time, location]; two smalls means [date, location].
    let smalls: Vec<ElementRef> = root.select(&SMALL).collect();
    let location = match smalls.len() {
        0 | 1 => None,
        2 => element_text(smalls[1]),
        _ => element_text(smalls[2]),
    };

    let body = text_outside_small(root);

    ItemDetails {
        start: abbr_title(&DTSTART),
        end: abbr_title(&DTEND),
        location,
        group: group_from_text(&body),
        description: clean_text(&body),
    }
}

fn element_text(el: ElementRef) -> Option<String> {
    clean_text(&el.text().collect::<String>())
}

/// Concatenated text of every node not nested inside a `<small>`.
fn text_outside_small(root: ElementRef) -> String {
    root.descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let in_small = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| el.name() == "small")
            });
            (!in_small).then(|| text.to_string())
        })
        .collect()
}

/// Recover the group name glued directly before the `Status:` marker.
fn group_from_text(text: &str) -> Option<String> {
    let idx = text.find(STATUS_MARKER)?;
    let before = text[..idx].trim_end();
    let candidate = GROUP_TAIL.captures(before)?.get(1)?.as_str().trim();
    let len = candidate.chars().count();
    (len > 1 && len < 100).then(|| candidate.to_string())
}
