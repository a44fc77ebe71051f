//! Shodan host lookups and searches over the REST API.

use pivottrack_core::{Error, HostQuery, RateLimiter, Result, Source, SourceConnector};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.shodan.io";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ShodanConfig {
    pub api_key: Option<String>,
    /// Calls per second; one when unset.
    pub rate_limit: Option<f64>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub struct ShodanConnector {
    client: Client,
    api_key: String,
    base_url: String,
    limiter: RateLimiter,
}

impl ShodanConnector {
    pub fn new(config: &ShodanConfig) -> Result<Self> {
        let api_key = match config.api_key.as_deref() {
            Some(k) if !k.trim().is_empty() => k.to_string(),
            _ => return Err(Error::unsupported("shodan connector requires an api_key")),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.unwrap_or(30)))
            .user_agent(format!("pivottrack/{}", pivottrack_core::version()))
            .build()
            .map_err(|e| Error::unsupported(format!("shodan client: {e}")))?;
        tracing::debug!("created shodan connector");
        Ok(ShodanConnector {
            client,
            api_key,
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()).trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(config.rate_limit),
        })
    }

    fn get(&mut self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.limiter.acquire();
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .map_err(|e| Error::Remote(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Remote(format!("{}: {}", status.as_u16(), api_message(&body))));
        }
        resp.json().map_err(|e| Error::Remote(e.to_string()))
    }
}

/// Shodan reports failures as `{"error": "..."}`.
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

impl HostQuery for ShodanConnector {
    fn query_host(&mut self, host: &str) -> Option<Value> {
        tracing::info!(host, "query shodan host");
        match self.get(&format!("/shodan/host/{host}"), &[]) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(host, error = %e, "shodan host query failed");
                None
            }
        }
    }

    fn query_host_search(&mut self, query: &str) -> Option<Value> {
        tracing::info!(query, "search shodan hosts");
        match self.get("/shodan/host/search", &[("query", query)]) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(query, error = %e, "shodan host search failed");
                None
            }
        }
    }
}

impl SourceConnector for ShodanConnector {
    fn source(&self) -> Source {
        Source::Shodan
    }

    fn as_host_query(&mut self) -> Option<&mut dyn HostQuery> {
        Some(self)
    }
}
