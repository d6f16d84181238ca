//! Keyword and temporal search over a snapshot.
//!
//! Scoring is weighted substring containment: each term found in a field
//! adds that field's weight once.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{DateRange, Event, SearchConfig, TimeRange};
use crate::services::extractor::KeywordExtractor;
use crate::services::temporal::{self, Resolution};

/// Words that never become search terms.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "is", "are",
    "was", "be", "i", "me", "my", "this", "that", "it", "do", "want", "find", "looking",
    "something", "events", "event", "any", "some", "what", "show", "get", "can", "will", "like",
    "go", "going", "around", "near", "about", "up", "out", "next", "weekend", "today", "tomorrow",
    "tonight", "week", "month", "morning", "afternoon", "evening", "after", "before", "between",
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("valid token regex"));

/// Per-field score weights.
pub const FIELD_WEIGHTS: [(Field, u32); 5] = [
    (Field::Title, 4),
    (Field::Group, 3),
    (Field::Description, 2),
    (Field::Location, 1),
    (Field::Audience, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Group,
    Description,
    Location,
    Audience,
}

impl Field {
    /// Lowercased searchable text of this field, if present.
    fn text(self, event: &Event) -> Option<String> {
        let raw = match self {
            Field::Title => Some(event.title.clone()),
            Field::Group => event.group.clone(),
            Field::Description => event.description.clone(),
            Field::Location => event.location.clone(),
            Field::Audience => event.audience.as_ref().map(|labels| labels.join(" ")),
        }?;
        (!raw.is_empty()).then(|| raw.to_lowercase())
    }
}

fn is_term(word: &str) -> bool {
    word.chars().count() > 1 && !STOP_SET.contains(word)
}

/// Ordered, de-duplicated search terms from a free-text query. Explicit
/// dates and clock times are left to the temporal resolver.
pub fn tokenize(query: &str) -> Vec<String> {
    let lowered = temporal::strip_expressions(query);
    let mut seen = HashSet::new();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| is_term(w))
        .filter(|w| seen.insert(*w))
        .map(str::to_string)
        .collect()
}

/// Append new, non-stop-word keywords to `terms`.
pub fn expand(mut terms: Vec<String>, keywords: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = terms.iter().cloned().collect();
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if is_term(&keyword) && seen.insert(keyword.clone()) {
            terms.push(keyword);
        }
    }
    terms
}

/// Weighted containment score of one event.
pub fn score(event: &Event, terms: &[String]) -> u32 {
    FIELD_WEIGHTS
        .iter()
        .filter_map(|&(field, weight)| field.text(event).map(|text| (text, weight)))
        .map(|(text, weight)| {
            let hits = terms.iter().filter(|t| text.contains(t.as_str())).count() as u32;
            weight * hits
        })
        .sum()
}

/// Top `top_n` events by score; zero scores are dropped and ties keep
/// input order.
pub fn search<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    terms: &[String],
    top_n: usize,
) -> Vec<(u32, &'a Event)> {
    let mut scored: Vec<(u32, &Event)> = events
        .into_iter()
        .map(|e| (score(e, terms), e))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(top_n);
    scored
}

/// Events whose start date is inside the range. Unparseable starts are
/// excluded.
pub fn filter_by_date<'a>(events: &[&'a Event], range: &DateRange) -> Vec<&'a Event> {
    events
        .iter()
        .copied()
        .filter(|e| e.start_date().is_some_and(|d| range.contains(d)))
        .collect()
}

/// Events whose start time-of-day is inside the window. Starts without a
/// time component are excluded.
pub fn filter_by_time<'a>(events: &[&'a Event], range: &TimeRange) -> Vec<&'a Event> {
    events
        .iter()
        .copied()
        .filter(|e| e.start_time().is_some_and(|t| range.contains(t)))
        .collect()
}

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub top: Option<usize>,
    pub use_extractor: bool,
    pub model: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top: None,
            use_extractor: true,
            model: None,
        }
    }
}

/// One ranked result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchHit {
    pub score: u32,
    pub url: String,
    pub title: String,
    pub start: Option<String>,
    pub location: Option<String>,
    pub group: Option<String>,
    pub image_url: Option<String>,
}

impl SearchHit {
    fn new(score: u32, event: &Event) -> Self {
        Self {
            score,
            url: event.url.clone(),
            title: event.title.clone(),
            start: event.start.clone(),
            location: event.location.clone(),
            group: event.group.clone(),
            image_url: event.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub terms: Vec<String>,
    pub llm_used: bool,
    pub date_range: Option<DateRange>,
    pub time_range: Option<TimeRange>,
    pub total_searched: usize,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Query engine: tokenizes, optionally expands through an extractor,
/// resolves windows, filters and ranks.
#[derive(Clone)]
pub struct SearchEngine {
    config: SearchConfig,
    extractor: Option<Arc<dyn KeywordExtractor>>,
}

impl SearchEngine {
    pub fn new(config: SearchConfig, extractor: Option<Arc<dyn KeywordExtractor>>) -> Self {
        Self { config, extractor }
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    /// Run a request against `events` as of `now`.
    pub async fn execute(
        &self,
        events: &[Event],
        request: &SearchRequest,
        now: NaiveDateTime,
    ) -> Result<SearchResponse> {
        let top = request.top.unwrap_or(self.config.default_top);
        if top == 0 || top > self.config.max_top {
            return Err(AppError::invalid_query(format!(
                "top must be between 1 and {}",
                self.config.max_top
            )));
        }

        let mut terms = tokenize(&request.query);
        let mut resolution = temporal::resolve(&request.query, now);
        let mut llm_used = false;

        if request.use_extractor {
            if let Some(extractor) = &self.extractor {
                if let Some(extraction) = extractor
                    .extract(&request.query, now, request.model.as_deref())
                    .await
                {
                    let raw_terms = terms.len();
                    terms = expand(terms, &extraction.keywords);
                    let extracted = extraction.resolution();
                    llm_used = terms.len() > raw_terms || !extracted.is_empty();
                    resolution = extracted.or(resolution);
                }
            }
        }

        self.rank(events, request.query.clone(), terms, resolution, llm_used, top)
    }

    fn rank(
        &self,
        events: &[Event],
        query: String,
        terms: Vec<String>,
        resolution: Resolution,
        llm_used: bool,
        top: usize,
    ) -> Result<SearchResponse> {
        if terms.is_empty() && resolution.is_empty() {
            return Err(AppError::NoSearchTerms);
        }

        let mut pool: Vec<&Event> = events.iter().collect();
        if let Some(range) = &resolution.date_range {
            pool = filter_by_date(&pool, range);
        }
        if let Some(range) = &resolution.time_range {
            pool = filter_by_time(&pool, range);
        }
        let total_searched = pool.len();

        let results: Vec<SearchHit> = if terms.is_empty() {
            pool.iter().take(top).map(|e| SearchHit::new(0, e)).collect()
        } else {
            search(pool, &terms, top)
                .into_iter()
                .map(|(s, e)| SearchHit::new(s, e))
                .collect()
        };

        log::info!(
            "Search '{}' terms={:?} pool={} hits={}",
            query,
            terms,
            total_searched,
            results.len()
        );

        Ok(SearchResponse {
            query,
            terms,
            llm_used,
            date_range: resolution.date_range,
            time_range: resolution.time_range,
            total_searched,
            count: results.len(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::time::Duration;

    use super::*;
    use crate::services::extractor::Extraction;

    fn event(title: &str, start: &str) -> Event {
        Event {
            start: Some(start.to_string()),
            ..Event::new(title, format!("https://e.edu/{}", title.replace(' ', "-")))
        }
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    // Wednesday
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 8)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Find me PIZZA night this weekend, pizza & jazz in a 2-day fest"),
            terms(&["pizza", "night", "jazz", "day", "fest"])
        );
        assert!(tokenize("the a I").is_empty());
    }

    #[test]
    fn test_tokenize_skips_dates_and_times() {
        assert!(tokenize("after 6pm").is_empty());
        assert!(tokenize("after 18:30").is_empty());
        assert!(tokenize("on 4/20").is_empty());
        assert!(tokenize("2026-04-20").is_empty());
        assert_eq!(tokenize("jazz before 9pm on 4/10"), terms(&["jazz"]));
        assert_eq!(tokenize("room 302 open house"), terms(&["302", "open", "house"]));
    }

    #[test]
    fn test_expand() {
        let expanded = expand(
            terms(&["pizza"]),
            &terms(&["Pizza", "tacos", "the", "x", "bbq", "tacos"]),
        );
        assert_eq!(expanded, terms(&["pizza", "tacos", "bbq"]));
    }

    #[test]
    fn test_score_weights() {
        let e = Event {
            group: Some("Pizza Club".into()),
            description: Some("Free pizza and games".into()),
            location: Some("Union".into()),
            audience: Some(vec!["Students".into(), "Pizza Lovers".into()]),
            ..Event::new("Pizza Night", "https://e.edu/1")
        };
        assert_eq!(score(&e, &terms(&["pizza"])), 4 + 3 + 2 + 1);
        assert_eq!(score(&e, &terms(&["pizza", "union"])), 4 + 3 + 2 + 1 + 1);
        assert_eq!(score(&e, &terms(&["chess"])), 0);
        // substring, not token, matching
        assert_eq!(score(&e, &terms(&["izz"])), 10);
    }

    #[test]
    fn test_search_ranking() {
        let events = vec![
            Event {
                description: Some("jazz".into()),
                ..event("Open Mic", "2026-04-10T18:00:00")
            },
            event("Jazz Night", "2026-04-10T19:00:00"),
            event("Chess", "2026-04-10T19:00:00"),
            Event {
                description: Some("more jazz".into()),
                ..event("Poetry", "2026-04-10T20:00:00")
            },
        ];
        let hits = search(&events, &terms(&["jazz"]), 10);
        let titles: Vec<(&str, u32)> = hits.iter().map(|(s, e)| (e.title.as_str(), *s)).collect();
        assert_eq!(titles, vec![("Jazz Night", 4), ("Open Mic", 2), ("Poetry", 2)]);

        assert_eq!(search(&events, &terms(&["jazz"]), 1).len(), 1);
        assert!(search(&events, &[], 10).is_empty());
    }

    #[test]
    fn test_filter_by_date() {
        let events = vec![
            event("First", "2026-04-10T18:00:00"),
            event("Second", "2026-04-12T09:00:00"),
            event("Loose", "sometime soon"),
        ];
        let pool: Vec<&Event> = events.iter().collect();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 4, 10).unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 11).unwrap(),
        )
        .unwrap();
        let kept = filter_by_date(&pool, &range);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "First");
    }

    #[test]
    fn test_filter_by_time_excludes_dateonly() {
        let events = vec![
            event("Evening", "2026-04-10T19:00:00"),
            event("Morning", "2026-04-10T08:00:00"),
            event("All Day", "2026-04-10"),
        ];
        let pool: Vec<&Event> = events.iter().collect();
        let evening = TimeRange::new(
            chrono::NaiveTime::from_hms_opt(17, 0, 0),
            chrono::NaiveTime::from_hms_opt(21, 0, 0),
        )
        .unwrap();
        let kept = filter_by_time(&pool, &evening);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Evening");
    }

    fn weekend_events() -> Vec<Event> {
        vec![
            event("Pizza Night", "2026-04-10T18:00:00-05:00"),
            Event {
                description: Some("Slices and a movie night".into()),
                ..event("Movie Social", "2026-04-11T19:00:00-05:00")
            },
            event("Pizza Night", "2026-04-11T18:00:00-05:00"),
            event("Chess Club", "2026-04-12T13:00:00-05:00"),
            event("Pizza Lunch", "2026-04-13T12:00:00-05:00"),
        ]
    }

    #[tokio::test]
    async fn test_pizza_night_this_weekend() {
        let engine = SearchEngine::new(SearchConfig::default(), None);
        let request = SearchRequest {
            use_extractor: false,
            ..SearchRequest::new("pizza night this weekend")
        };
        let response = engine.execute(&weekend_events(), &request, now()).await.unwrap();

        assert_eq!(response.terms, terms(&["pizza", "night"]));
        assert_eq!(
            response.date_range,
            DateRange::new(
                NaiveDate::from_ymd_opt(2026, 4, 11).unwrap(),
                NaiveDate::from_ymd_opt(2026, 4, 12).unwrap()
            )
        );
        assert_eq!(response.total_searched, 3);
        let ranked: Vec<(&str, u32)> = response
            .results
            .iter()
            .map(|h| (h.title.as_str(), h.score))
            .collect();
        assert_eq!(ranked, vec![("Pizza Night", 8), ("Movie Social", 2)]);
        assert!(!response.llm_used);
    }

    #[tokio::test]
    async fn test_pure_date_query() {
        let engine = SearchEngine::new(SearchConfig::default(), None);
        let response = engine
            .execute(&weekend_events(), &SearchRequest::new("this weekend"), now())
            .await
            .unwrap();
        assert!(response.terms.is_empty());
        let titles: Vec<&str> = response.results.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["Movie Social", "Pizza Night", "Chess Club"]);
        assert!(response.results.iter().all(|h| h.score == 0));
    }

    #[tokio::test]
    async fn test_pure_clock_and_date_queries() {
        let events = vec![
            event("Jazz Night", "2026-04-10T19:00:00-05:00"),
            event("Earth Day Fair", "2026-04-20T12:00:00-05:00"),
        ];
        let engine = SearchEngine::new(SearchConfig::default(), None);
        for (query, expected) in [
            ("after 6pm", "Jazz Night"),
            ("after 18:30", "Jazz Night"),
            ("on 4/20", "Earth Day Fair"),
            ("2026-04-20", "Earth Day Fair"),
        ] {
            let response = engine
                .execute(&events, &SearchRequest::new(query), now())
                .await
                .unwrap();
            assert!(response.terms.is_empty(), "{query}");
            let titles: Vec<&str> = response.results.iter().map(|h| h.title.as_str()).collect();
            assert_eq!(titles, vec![expected], "{query}");
        }
    }

    #[tokio::test]
    async fn test_no_terms_is_client_error() {
        let engine = SearchEngine::new(SearchConfig::default(), None);
        let result = engine
            .execute(&weekend_events(), &SearchRequest::new("show me the events"), now())
            .await;
        assert!(matches!(result, Err(AppError::NoSearchTerms)));
    }

    #[tokio::test]
    async fn test_top_bounds() {
        let engine = SearchEngine::new(SearchConfig::default(), None);
        for top in [0, 101] {
            let request = SearchRequest {
                top: Some(top),
                ..SearchRequest::new("pizza")
            };
            let result = engine.execute(&weekend_events(), &request, now()).await;
            assert!(matches!(result, Err(AppError::InvalidQuery(_))));
        }
    }

    struct FixedExtractor(Option<Extraction>);

    #[async_trait]
    impl KeywordExtractor for FixedExtractor {
        fn name(&self) -> &str {
            "fixed"
        }
        fn default_model(&self) -> &str {
            "fixed"
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<String> {
            Err(AppError::collaborator("unused"))
        }
        async fn extract(
            &self,
            _query: &str,
            _now: NaiveDateTime,
            _model: Option<&str>,
        ) -> Option<Extraction> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_extractor_expands_terms_and_dates() {
        let monday = NaiveDate::from_ymd_opt(2026, 4, 13).unwrap();
        let extraction = Extraction {
            keywords: vec!["food".into(), "lunch".into()],
            date_range: Some(DateRange::day(monday)),
            time_range: None,
        };
        let engine = SearchEngine::new(
            SearchConfig::default(),
            Some(Arc::new(FixedExtractor(Some(extraction)))),
        );
        let response = engine
            .execute(&weekend_events(), &SearchRequest::new("food this weekend"), now())
            .await
            .unwrap();

        assert!(response.llm_used);
        assert_eq!(response.terms, terms(&["food", "lunch"]));
        assert_eq!(response.date_range, Some(DateRange::day(monday)));
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].title, "Pizza Lunch");
    }

    #[tokio::test]
    async fn test_empty_extraction_is_not_reported_as_used() {
        let extraction = Extraction {
            keywords: vec!["chess".into(), "the".into()],
            date_range: None,
            time_range: None,
        };
        let engine = SearchEngine::new(
            SearchConfig::default(),
            Some(Arc::new(FixedExtractor(Some(extraction)))),
        );
        let response = engine
            .execute(&weekend_events(), &SearchRequest::new("chess this weekend"), now())
            .await
            .unwrap();
        assert!(!response.llm_used);
        assert_eq!(response.terms, terms(&["chess"]));
        assert_eq!(response.results[0].title, "Chess Club");
    }

    #[tokio::test]
    async fn test_extractor_failure_falls_back() {
        let engine = SearchEngine::new(
            SearchConfig::default(),
            Some(Arc::new(FixedExtractor(None))),
        );
        let response = engine
            .execute(&weekend_events(), &SearchRequest::new("chess this weekend"), now())
            .await
            .unwrap();
        assert!(!response.llm_used);
        assert_eq!(response.count, 1);
        assert_eq!(response.results[0].title, "Chess Club");
    }
}
