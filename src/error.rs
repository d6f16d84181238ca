// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch failed, timed out, or returned a non-success status
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Malformed markup, feed, or JSON
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// External keyword/date extraction service is unreachable or returned garbage
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// A refresh was requested while another one is running
    #[error("Refresh already in progress")]
    RefreshInProgress,

    /// The query produced no usable terms and no date/time signal
    #[error("No usable search terms in query")]
    NoSearchTerms,

    /// A one-shot scrape would replace a snapshot file with far fewer events
    #[error(
        "Refusing to overwrite {existing} events with {incoming} ({drop_percent:.1}% drop > {threshold_percent}% threshold)"
    )]
    OverwriteRefused {
        incoming: usize,
        existing: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// HTTP client construction or transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad request parameter
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl AppError {
    /// Create a network error for the given URL.
    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error with context.
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a collaborator error.
    pub fn collaborator(message: impl fmt::Display) -> Self {
        Self::CollaboratorUnavailable(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
}
