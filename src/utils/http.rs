// src/utils/http.rs

//! HTTP fetch collaborator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Anything that can turn a URL into a response body.
///
/// Every adapter and the enrichment engine fetch through this trait so that
/// tests can substitute canned pages.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET the URL and return the body text.
    ///
    /// Transport failures, timeouts, and non-2xx statuses are
    /// [`AppError::Network`].
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/html, application/xml, application/json, */*")
            .send()
            .await
            .map_err(|e| AppError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(url, format!("HTTP {status}")));
        }

        response.text().await.map_err(|e| AppError::network(url, e))
    }
}

/// [`Fetcher`] serving canned bodies from memory.
///
/// Unknown URLs fail with a network error, the same way an unreachable host
/// would.
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    pages: HashMap<String, String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body for an exact URL.
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::network(url, "HTTP 404 Not Found"))
    }
}
