//! Normalized event record.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// An event harvested from any source, in the shape every adapter produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Event {
    /// Whitespace-collapsed, never empty
    pub title: String,

    /// Absolute URL of the event page
    pub url: String,

    /// Start timestamp as published by the source (precision varies)
    pub start: Option<String>,

    /// End timestamp as published by the source
    pub end: Option<String>,

    pub location: Option<String>,

    pub description: Option<String>,

    /// Hosting calendar or organization
    pub group: Option<String>,

    pub image_url: Option<String>,

    /// Audience labels in page order
    pub audience: Option<Vec<String>>,

    /// Page or endpoint the record was harvested from
    pub source: Option<String>,
}

impl Event {
    /// Create an event with only the required fields set.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Key used to drop duplicates within one source.
    pub fn identity_key(&self) -> (String, String) {
        (
            self.title.trim().to_lowercase(),
            self.url.trim().to_lowercase(),
        )
    }

    /// Key used to recognize the same event reported by two sources.
    ///
    /// Alphanumeric-only lowercased title plus the first ten characters of
    /// the start timestamp (the calendar date for ISO-like values). Two
    /// same-named events on the same day collapse into one.
    pub fn cross_source_key(&self) -> (String, String) {
        let title: String = self
            .title
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let day: String = self
            .start
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(10)
            .collect();
        (title, day)
    }

    /// Calendar date of the start timestamp, if it parses.
    pub fn start_date(&self) -> Option<NaiveDate> {
        let raw = self.start.as_deref()?.trim();
        NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
    }

    /// Wall-clock time of the start timestamp, as written by the source.
    ///
    /// Date-only values have no time and return `None`.
    pub fn start_time(&self) -> Option<NaiveTime> {
        let raw = self.start.as_deref()?.trim();
        match raw.as_bytes().get(10) {
            Some(b'T') | Some(b' ') => {}
            _ => return None,
        }
        NaiveTime::parse_from_str(raw.get(11..16)?, "%H:%M").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_start(start: &str) -> Event {
        Event {
            start: Some(start.to_string()),
            ..Event::new("Jazz Night", "https://events.example.edu/2026/04/10/1/")
        }
    }

    #[test]
    fn test_identity_key_normalizes_case_and_whitespace() {
        let a = Event::new("  Jazz Night ", "https://Example.com/E/1 ");
        let b = Event::new("jazz night", "https://example.com/e/1");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_cross_source_key_strips_punctuation() {
        let a = with_start("2026-04-10T18:00:00-05:00");
        let mut b = with_start("2026-04-10T23:00:00Z");
        b.title = "JAZZ-NIGHT!".to_string();
        b.url = "https://other.example.com/event/99".to_string();
        assert_eq!(a.cross_source_key(), b.cross_source_key());
        assert_eq!(a.cross_source_key().1, "2026-04-10");
    }

    #[test]
    fn test_cross_source_key_without_start() {
        let event = Event::new("Open Mic", "https://example.com/1");
        assert_eq!(event.cross_source_key(), ("openmic".to_string(), String::new()));
    }

    #[test]
    fn test_start_date_and_time() {
        let event = with_start("2026-04-10T18:30:00");
        assert_eq!(event.start_date(), NaiveDate::from_ymd_opt(2026, 4, 10));
        assert_eq!(event.start_time(), NaiveTime::from_hms_opt(18, 30, 0));

        let spaced = with_start("2026-04-10 09:05");
        assert_eq!(spaced.start_time(), NaiveTime::from_hms_opt(9, 5, 0));
    }

    #[test]
    fn test_date_only_start_has_no_time() {
        let event = with_start("2026-04-10");
        assert!(event.start_date().is_some());
        assert!(event.start_time().is_none());
    }

    #[test]
    fn test_unparseable_start() {
        assert!(with_start("next Tuesday").start_date().is_none());
        assert!(Event::new("x", "https://e.com").start_date().is_none());
    }
}
