//! Utility functions and helpers.

pub mod http;

use scraper::Html;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Turn an href found on `base_url` into an absolute, scheme-qualified URL.
///
/// Protocol-relative links (`//host/path`) are upgraded to https.
pub fn absolutize(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(base_url) {
        Ok(base) => resolve_url(&base, href),
        Err(_) => href.to_string(),
    }
}

/// Collapse runs of whitespace and trim; empty results become `None`.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Like [`clean_text`] for optional input.
pub fn clean_opt(text: Option<&str>) -> Option<String> {
    text.and_then(clean_text)
}

/// Visible text of an HTML fragment, with entities decoded.
pub fn html_to_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}
