//! Censys Search v2 host lookups and searches.
//!
//! The API wraps every response as `{"code", "status", "result"}`. Host
//! views are returned as the bare `result` object and searches as the bare
//! list of hits, which is the shape `QueryResult` recognizes as Censys.

use pivottrack_core::{Error, HostQuery, RateLimiter, Result, Source, SourceConnector};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://search.censys.io/api";
const PER_PAGE: &str = "100";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct CensysConfig {
    pub api_id: Option<String>,
    pub api_secret: Option<String>,
    /// Calls per second; one when unset.
    pub rate_limit: Option<f64>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

pub struct CensysConnector {
    client: Client,
    api_id: String,
    api_secret: String,
    base_url: String,
    limiter: RateLimiter,
}

impl CensysConnector {
    pub fn new(config: &CensysConfig) -> Result<Self> {
        let (api_id, api_secret) = match (config.api_id.as_deref(), config.api_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id.to_string(), secret.to_string()),
            _ => return Err(Error::unsupported("censys connector requires api_id and api_secret")),
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.unwrap_or(30)))
            .user_agent(format!("pivottrack/{}", pivottrack_core::version()))
            .build()
            .map_err(|e| Error::unsupported(format!("censys client: {e}")))?;
        Ok(CensysConnector {
            client,
            api_id,
            api_secret,
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()).trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(config.rate_limit),
        })
    }

    fn get(&mut self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.limiter.acquire();
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.api_id, Some(&self.api_secret))
            .query(params)
            .send()
            .map_err(|e| Error::Remote(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp.json().unwrap_or(Value::Null);
        if !status.is_success() {
            let msg = body.get("error").and_then(Value::as_str).unwrap_or("no error message");
            return Err(Error::Remote(format!("{}: {}", status.as_u16(), msg)));
        }
        unwrap_result(body)
    }
}

fn unwrap_result(body: Value) -> Result<Value> {
    match body {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| Error::Remote("censys response without result".into())),
        _ => Err(Error::Remote("censys response is not an object".into())),
    }
}

fn search_hits(result: Value) -> Result<Value> {
    match result {
        Value::Object(mut map) => match map.remove("hits") {
            Some(hits @ Value::Array(_)) => Ok(hits),
            _ => Err(Error::Remote("censys search result without hits".into())),
        },
        _ => Err(Error::Remote("censys search result is not an object".into())),
    }
}

impl HostQuery for CensysConnector {
    fn query_host(&mut self, host: &str) -> Option<Value> {
        tracing::info!(host, "query censys host");
        match self.get(&format!("/v2/hosts/{host}"), &[]) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(host, error = %e, "censys host query failed");
                None
            }
        }
    }

    fn query_host_search(&mut self, query: &str) -> Option<Value> {
        tracing::info!(query, "search censys hosts");
        match self.get("/v2/hosts/search", &[("q", query), ("per_page", PER_PAGE)]).and_then(search_hits) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(query, error = %e, "censys host search failed");
                None
            }
        }
    }
}

impl SourceConnector for CensysConnector {
    fn source(&self) -> Source {
        Source::Censys
    }

    fn as_host_query(&mut self) -> Option<&mut dyn HostQuery> {
        Some(self)
    }
}
