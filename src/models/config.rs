//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client settings shared by every fetch
    #[serde(default)]
    pub http: HttpConfig,

    /// Source endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Detail-page enrichment
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Periodic refresh and snapshot persistence
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Search limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Optional keyword/date extraction service
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("EVENTS_FILE") {
            self.refresh.snapshot_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("SCRAPE_INTERVAL").and_then(|v| v.parse().ok()) {
            self.refresh.interval_secs = secs;
        }
        if let Some(workers) = lookup("SCRAPE_WORKERS").and_then(|v| v.parse().ok()) {
            self.enrichment.workers = workers;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.extractor.model = model;
        }
        if let Some(bind) = lookup("HARVESTER_BIND") {
            self.server.bind = bind;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.sources.feed_url)
            .map_err(|e| AppError::validation(format!("sources.feed_url: {e}")))?;
        if self.sources.discovery_enabled {
            url::Url::parse(&self.sources.discovery_search_url).map_err(|e| {
                AppError::validation(format!("sources.discovery_search_url: {e}"))
            })?;
        }
        if self.sources.discovery_page_size == 0 {
            return Err(AppError::validation(
                "sources.discovery_page_size must be > 0",
            ));
        }
        if self.enrichment.workers == 0 {
            return Err(AppError::validation("enrichment.workers must be > 0"));
        }
        if self.refresh.interval_secs == 0 {
            return Err(AppError::validation("refresh.interval_secs must be > 0"));
        }
        if self.refresh.max_drop_percent > 100 {
            return Err(AppError::validation(
                "refresh.max_drop_percent must be <= 100",
            ));
        }
        if self.search.max_top == 0 || self.search.default_top == 0 {
            return Err(AppError::validation("search limits must be > 0"));
        }
        if self.search.default_top > self.search.max_top {
            return Err(AppError::validation(
                "search.default_top exceeds search.max_top",
            ));
        }
        if self.extractor.timeout_secs == 0 {
            return Err(AppError::validation("extractor.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Source endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Primary syndication feed of upcoming events
    #[serde(default = "defaults::feed_url")]
    pub feed_url: String,

    /// Calendar root; monthly pages live at `{base}{YYYY}/{MM}/`
    #[serde(default = "defaults::archive_base_url")]
    pub archive_base_url: String,

    /// Whether the discovery API is merged into each refresh
    #[serde(default = "defaults::enabled")]
    pub discovery_enabled: bool,

    #[serde(default = "defaults::discovery_search_url")]
    pub discovery_search_url: String,

    /// Event page URL is this base plus the item id
    #[serde(default = "defaults::discovery_event_base_url")]
    pub discovery_event_base_url: String,

    /// Image URL is this base plus the item image path
    #[serde(default = "defaults::discovery_image_base_url")]
    pub discovery_image_base_url: String,

    /// Provenance recorded on discovery events
    #[serde(default = "defaults::discovery_source_url")]
    pub discovery_source_url: String,

    /// Items requested per page
    #[serde(default = "defaults::discovery_page_size")]
    pub discovery_page_size: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            feed_url: defaults::feed_url(),
            archive_base_url: defaults::archive_base_url(),
            discovery_enabled: defaults::enabled(),
            discovery_search_url: defaults::discovery_search_url(),
            discovery_event_base_url: defaults::discovery_event_base_url(),
            discovery_image_base_url: defaults::discovery_image_base_url(),
            discovery_source_url: defaults::discovery_source_url(),
            discovery_page_size: defaults::discovery_page_size(),
        }
    }
}

/// Detail-page enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Concurrent detail-page fetches
    #[serde(default = "defaults::workers")]
    pub workers: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            workers: defaults::workers(),
        }
    }
}

/// Periodic refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between refresh cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Where the published snapshot is persisted
    #[serde(default = "defaults::snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Largest drop in event count a one-shot scrape may write over (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Snapshot files smaller than this are always overwritten
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            snapshot_path: defaults::snapshot_path(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "defaults::default_top")]
    pub default_top: usize,

    #[serde(default = "defaults::max_top")]
    pub max_top: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top: defaults::default_top(),
            max_top: defaults::max_top(),
        }
    }
}

/// Which extraction service, if any, is consulted at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorProvider {
    #[default]
    None,
    Gemini,
    Ollama,
}

/// Keyword/date extraction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub provider: ExtractorProvider,

    /// Default model; requests may override it
    #[serde(default = "defaults::model")]
    pub model: String,

    /// Service root; provider default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,

    #[serde(default = "defaults::extractor_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            provider: ExtractorProvider::default(),
            model: defaults::model(),
            base_url: None,
            api_key_env: defaults::api_key_env(),
            timeout_secs: defaults::extractor_timeout(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; event-harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        20
    }

    // Source defaults
    pub fn feed_url() -> String {
        "https://events.unl.edu/upcoming/?format=rss&limit=-1".into()
    }
    pub fn archive_base_url() -> String {
        "https://events.unl.edu/".into()
    }
    pub fn discovery_search_url() -> String {
        "https://unl.campuslabs.com/engage/api/discovery/event/search".into()
    }
    pub fn discovery_event_base_url() -> String {
        "https://unl.campuslabs.com/engage/event/".into()
    }
    pub fn discovery_image_base_url() -> String {
        "https://se-images.campuslabs.com/clink/images/".into()
    }
    pub fn discovery_source_url() -> String {
        "https://unl.campuslabs.com/engage/events".into()
    }
    pub fn discovery_page_size() -> usize {
        100
    }

    pub fn enabled() -> bool {
        true
    }
    pub fn workers() -> usize {
        10
    }

    // Refresh defaults
    pub fn interval() -> u64 {
        3600
    }
    pub fn snapshot_path() -> PathBuf {
        PathBuf::from("scraped/events.json")
    }
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        10
    }

    // Search defaults
    pub fn default_top() -> usize {
        10
    }
    pub fn max_top() -> usize {
        100
    }

    // Extractor defaults
    pub fn model() -> String {
        "gemma-3-27b-it".into()
    }
    pub fn api_key_env() -> String {
        "GEMINI_API_KEY".into()
    }
    pub fn extractor_timeout() -> u64 {
        10
    }

    pub fn bind() -> String {
        "0.0.0.0:8080".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [refresh]
            interval_secs = 600

            [extractor]
            provider = "ollama"
            model = "llama3"
            "#,
        )
        .unwrap();

        assert_eq!(config.refresh.interval_secs, 600);
        assert_eq!(config.refresh.snapshot_path, PathBuf::from("scraped/events.json"));
        assert_eq!(config.extractor.provider, ExtractorProvider::Ollama);
        assert_eq!(config.enrichment.workers, 10);
        assert_eq!(config.search.max_top, 100);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EVENTS_FILE", "/data/events.json"),
            ("SCRAPE_INTERVAL", "900"),
            ("SCRAPE_WORKERS", "4"),
            ("GEMINI_MODEL", "gemma-3-12b-it"),
            ("HARVESTER_BIND", "127.0.0.1:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.refresh.snapshot_path, PathBuf::from("/data/events.json"));
        assert_eq!(config.refresh.interval_secs, 900);
        assert_eq!(config.enrichment.workers, 4);
        assert_eq!(config.extractor.model, "gemma-3-12b-it");
        assert_eq!(config.server.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "SCRAPE_INTERVAL").then(|| "soon".to_string()));
        assert_eq!(config.refresh.interval_secs, 3600);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.enrichment.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_feed_url() {
        let mut config = Config::default();
        config.sources.feed_url = "not a url".into();
        assert!(config.validate().is_err());
    }
}
