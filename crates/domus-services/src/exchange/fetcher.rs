//! Upstream rate fetching
//!
//! Every source is a plain HTTP GET whose body is searched with a configured
//! regular expression; the first capture group holds the EUR rate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use domus_core::{config::ExchangeConfig, models::RateSource, parsing::parse_rate};
use regex::Regex;
use reqwest::{Client, ClientBuilder};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::constants::FETCH_USER_AGENT;

/// Errors of a single upstream fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Timeout: no response within {0}s")]
    Timeout(u64),

    #[error("Rate not found in response from {0}")]
    PatternNotFound(String),

    #[error("Unparseable rate '{0}'")]
    Parse(String),

    #[error("Invalid extraction pattern for {0}: {1}")]
    InvalidPattern(String, String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

/// Fetches today's EUR rate of a source
#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self, source: RateSource) -> Result<Decimal, FetchError>;
}

struct Endpoint {
    url: String,
    pattern: Regex,
}

/// `RateFetcher` over HTTP with per-source URL and pattern
pub struct HttpRateFetcher {
    http_client: Client,
    endpoints: HashMap<RateSource, Endpoint>,
    timeout_secs: u64,
}

impl HttpRateFetcher {
    /// Build the client and compile every source pattern
    pub fn new(config: &ExchangeConfig) -> Result<Self, FetchError> {
        let http_client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(FETCH_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        let mut endpoints = HashMap::new();
        for source in RateSource::ALL {
            let source_config = config.source(source);
            let pattern = Regex::new(&source_config.pattern).map_err(|e| {
                FetchError::InvalidPattern(source.to_string(), e.to_string())
            })?;
            endpoints.insert(
                source,
                Endpoint {
                    url: source_config.url.clone(),
                    pattern,
                },
            );
        }

        Ok(Self {
            http_client,
            endpoints,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Extract and parse the rate captured by `pattern` in `body`
    pub fn extract(pattern: &Regex, body: &str, source: RateSource) -> Result<Decimal, FetchError> {
        let raw = pattern
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| FetchError::PatternNotFound(source.to_string()))?;

        parse_rate(raw).ok_or_else(|| FetchError::Parse(raw.to_string()))
    }
}

#[async_trait]
impl RateFetcher for HttpRateFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, source: RateSource) -> Result<Decimal, FetchError> {
        let endpoint = self
            .endpoints
            .get(&source)
            .ok_or_else(|| FetchError::NotConfigured(source.to_string()))?;

        debug!("Fetching {} rate from {}", source, endpoint.url);

        let response = self
            .http_client
            .get(&endpoint.url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout_secs)
                } else {
                    FetchError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("{} rate source returned status {}", source, status);
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_secs)
            } else {
                FetchError::Connection(format!("Failed to read response body: {}", e))
            }
        })?;

        let rate = Self::extract(&endpoint.pattern, &body, source)?;
        debug!("Fetched {} rate {}", source, rate);
        Ok(rate)
    }
}
