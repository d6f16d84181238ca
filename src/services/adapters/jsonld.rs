//! Structured-data (JSON-LD) adapter.
//!
//! Scans `<script type="application/ld+json">` blocks, expands `@graph`
//! wrappers, and maps nodes whose `@type` includes `Event`.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::Event;
use crate::services::dedup::dedupe_events;
use crate::utils::{absolutize, clean_opt};

static LD_SCRIPT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid ld+json selector")
});

/// One structured-data node, reduced to the fields events need.
///
/// Every field is parsed leniently: a value of an unexpected shape becomes
/// `None` instead of rejecting the whole node.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LdNode {
    #[serde(rename = "@type", default, deserialize_with = "lenient")]
    kind: Option<LdTypes>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(rename = "startDate", default, deserialize_with = "lenient")]
    start_date: Option<String>,
    #[serde(rename = "endDate", default, deserialize_with = "lenient")]
    end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    location: Option<LdLocation>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    image: Option<LdImage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LdTypes {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LdLocation {
    Text(String),
    Place {
        #[serde(default, deserialize_with = "lenient")]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        address: Option<LdAddress>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LdAddress {
    Text(String),
    Postal {
        #[serde(rename = "streetAddress", default, deserialize_with = "lenient")]
        street: Option<String>,
        #[serde(rename = "addressLocality", default, deserialize_with = "lenient")]
        locality: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LdImage {
    Url(String),
    Object { url: String },
    Many(Vec<LdImage>),
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl LdNode {
    pub(crate) fn is_event(&self) -> bool {
        match &self.kind {
            Some(LdTypes::One(t)) => t == "Event",
            Some(LdTypes::Many(ts)) => ts.iter().any(|t| t == "Event"),
            None => false,
        }
    }

    /// First image URL, as written in the markup.
    pub(crate) fn image_url(&self) -> Option<&str> {
        self.image.as_ref().and_then(LdImage::first)
    }

    fn location_text(&self) -> Option<String> {
        match self.location.as_ref()? {
            LdLocation::Text(text) => clean_opt(Some(text)),
            LdLocation::Place { name, address } => {
                clean_opt(name.as_deref()).or_else(|| match address.as_ref()? {
                    LdAddress::Text(text) => clean_opt(Some(text)),
                    LdAddress::Postal { street, locality } => {
                        let joined = [street.as_deref(), locality.as_deref()]
                            .into_iter()
                            .flatten()
                            .collect::<Vec<_>>()
                            .join(", ");
                        clean_opt(Some(&joined))
                    }
                })
            }
        }
    }

    fn into_event(self, source_url: &str) -> Option<Event> {
        let title = clean_opt(self.name.as_deref())?;
        let url = match self.url.as_deref().map(str::trim) {
            Some(href) if !href.is_empty() => absolutize(source_url, href),
            _ => source_url.to_string(),
        };
        let location = self.location_text();

        Some(Event {
            title,
            url,
            start: clean_opt(self.start_date.as_deref()),
            end: clean_opt(self.end_date.as_deref()),
            location,
            description: clean_opt(self.description.as_deref()),
            source: Some(source_url.to_string()),
            ..Event::default()
        })
    }
}

impl LdImage {
    fn first(&self) -> Option<&str> {
        match self {
            LdImage::Url(url) | LdImage::Object { url } => Some(url.as_str()),
            LdImage::Many(items) => items.iter().find_map(LdImage::first),
        }
    }
}

/// Every structured-data node in the document, with arrays and `@graph`
/// wrappers flattened. Blocks that are not valid JSON are skipped.
pub(crate) fn ld_nodes(document: &Html) -> Vec<LdNode> {
    let mut nodes = Vec::new();

    for script in document.select(&LD_SCRIPT) {
        let raw: String = script.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let data: Value = match serde_json::from_str(raw) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("Skipping malformed ld+json block: {}", e);
                continue;
            }
        };

        let top_level = match data {
            Value::Array(items) => items,
            other => vec![other],
        };
        for node in top_level {
            match node {
                Value::Object(mut map) if map.contains_key("@graph") => {
                    match map.remove("@graph") {
                        Some(Value::Array(items)) => nodes.extend(items),
                        Some(other) => nodes.push(other),
                        None => {}
                    }
                }
                other => nodes.push(other),
            }
        }
    }

    nodes
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|node| serde_json::from_value::<LdNode>(node).ok())
        .collect()
}

/// Extract events from an already parsed document.
pub fn events_from_document(document: &Html, source_url: &str) -> Vec<Event> {
    let events = ld_nodes(document)
        .into_iter()
        .filter(LdNode::is_event)
        .filter_map(|node| node.into_event(source_url));
    dedupe_events(events)
}

/// Extract events from a page's structured data.
pub fn parse_jsonld(html: &str, source_url: &str) -> Vec<Event> {
    events_from_document(&Html::parse_document(html), source_url)
}
