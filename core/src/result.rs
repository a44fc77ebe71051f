use serde_json::Value;

use crate::entity::{CanonicalEntity, Host};
use crate::error::{Error, Result};
use crate::source::{QueryCommand, Source};

/// One raw vendor response together with the lookup that produced it.
///
/// Connectors declare their vendor through [`QueryResult::tagged`]. Untagged
/// payloads, such as historical data, have it recovered from their structure:
///
/// * an object with `total` and `matches` is a Shodan search envelope;
/// * an object with `ip_str` is a Shodan host (or a single Shodan match);
/// * an object with a string `ip` and no `ip_str` is a Censys host;
/// * a bare array is judged by its first element: `ip_str` means a list of
///   Shodan matches, `ip` a Censys hit list.
///
/// Anything else, including an empty array, has no source.
#[derive(Debug, Clone)]
pub struct QueryResult {
    raw: Value,
    command: QueryCommand,
    search_term: String,
    source: Option<Source>,
}

impl QueryResult {
    pub fn new(raw: Value, command: QueryCommand, search_term: impl Into<String>) -> Self {
        let search_term = search_term.into();
        let source = infer_source(&raw);
        if source.is_none() {
            tracing::warn!(command = %command, search_term = %search_term, "could not infer source of query result");
        }
        QueryResult { raw, command, search_term, source }
    }

    /// Result whose vendor is declared by the connector that produced it.
    /// The payload shape is not consulted.
    pub fn tagged(raw: Value, command: QueryCommand, search_term: impl Into<String>, source: Source) -> Self {
        if let Some(inferred) = infer_source(&raw) {
            if inferred != source {
                tracing::debug!(declared = %source, inferred = %inferred, "payload shape disagrees with connector");
            }
        }
        QueryResult { raw, command, search_term: search_term.into(), source: Some(source) }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn command(&self) -> QueryCommand {
        self.command
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// `None` when the payload shape matches no known vendor.
    pub fn source(&self) -> Option<Source> {
        self.source
    }

    pub fn is_collection(&self) -> bool {
        match &self.raw {
            Value::Array(_) => true,
            Value::Object(map) => map.contains_key("total") && map.contains_key("matches"),
            _ => false,
        }
    }

    fn elements(&self) -> Vec<&Value> {
        if !self.is_collection() {
            return vec![&self.raw];
        }
        match &self.raw {
            Value::Array(items) => items.iter().collect(),
            other => other
                .get("matches")
                .and_then(Value::as_array)
                .map(|m| m.iter().collect())
                .unwrap_or_default(),
        }
    }

    pub fn element_count(&self) -> usize {
        self.elements().len()
    }

    /// Maps every element through the vendor's mapping function.
    pub fn canonical_entities(&self) -> Result<Vec<CanonicalEntity>> {
        let source = self.source.ok_or_else(|| {
            Error::unsupported(format!("cannot interpret result for \"{}\"", self.search_term))
        })?;
        self.elements()
            .into_iter()
            .map(|v| Host::from_source(source, v).map(CanonicalEntity::Host))
            .collect()
    }
}

fn infer_source(raw: &Value) -> Option<Source> {
    match raw {
        Value::Object(map) => {
            if map.contains_key("total") && map.contains_key("matches") {
                return Some(Source::Shodan);
            }
            if map.contains_key("ip_str") {
                return Some(Source::Shodan);
            }
            match map.get("ip") {
                Some(Value::String(_)) => Some(Source::Censys),
                _ => None,
            }
        }
        Value::Array(items) => match items.first() {
            Some(Value::Object(first)) if first.contains_key("ip_str") => Some(Source::Shodan),
            Some(Value::Object(first)) if first.contains_key("ip") => Some(Source::Censys),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shodan_search() -> Value {
        json!({
            "matches": [
                {"ip": 1616761883u64, "ip_str": "96.93.212.27", "port": 443, "transport": "tcp",
                 "hostnames": ["three.webapplify.net"], "domains": ["webapplify.net"],
                 "timestamp": "2021-01-25T21:33:49.154513"},
                {"ip": 3104568883u64, "ip_str": "185.11.246.51", "port": 80, "transport": "tcp",
                 "hostnames": ["kolobok.us"], "domains": ["kolobok.us"],
                 "timestamp": "2021-01-25T21:33:51.172037"}
            ],
            "facets": {},
            "total": 23047224
        })
    }

    fn shodan_host() -> Value {
        json!({
            "ip": 134744072,
            "ip_str": "8.8.8.8",
            "hostnames": ["dns.google"],
            "ports": [53],
            "data": [{"port": 53, "transport": "udp", "timestamp": "2021-01-22T08:49:35.190817"}]
        })
    }

    fn censys_host() -> Value {
        json!({
            "ip": "8.8.8.8",
            "services": [{"service_name": "DNS", "port": 53, "transport_protocol": "UDP"}],
            "last_updated_at": "2021-04-01T14:10:10.712Z"
        })
    }

    fn censys_search() -> Value {
        json!([
            {"ip": "1.0.0.0", "services": [{"service_name": "HTTP", "port": 443}], "last_updated_at": "2023-07-15T08:54:31.636Z"},
            {"ip": "1.0.0.1", "services": [{"service_name": "HTTP", "port": 80}], "last_updated_at": "2023-07-15T08:54:31.636Z"}
        ])
    }

    #[test]
    fn shodan_envelope_is_collection() {
        let r = QueryResult::new(shodan_search(), QueryCommand::Generic, "product:nginx");
        assert_eq!(r.source(), Some(Source::Shodan));
        assert!(r.is_collection());
        let ips: Vec<String> = r.canonical_entities().unwrap().iter().map(CanonicalEntity::identity).collect();
        assert_eq!(ips, vec!["96.93.212.27", "185.11.246.51"]);
        assert_eq!(r.element_count(), 2);
    }

    #[test]
    fn shodan_host_is_single() {
        let r = QueryResult::new(shodan_host(), QueryCommand::Host, "8.8.8.8");
        assert_eq!(r.source(), Some(Source::Shodan));
        assert!(!r.is_collection());
        assert_eq!(r.element_count(), 1);
        assert_eq!(r.canonical_entities().unwrap()[0].identity(), "8.8.8.8");
    }

    #[test]
    fn censys_host_and_search() {
        let host = QueryResult::new(censys_host(), QueryCommand::Host, "8.8.8.8");
        assert_eq!(host.source(), Some(Source::Censys));
        assert!(!host.is_collection());
        assert_eq!(host.element_count(), 1);

        let search = QueryResult::new(censys_search(), QueryCommand::Generic, "services.service_name: HTTP");
        assert_eq!(search.source(), Some(Source::Censys));
        assert!(search.is_collection());
        let entities = search.canonical_entities().unwrap();
        assert_eq!(search.element_count(), entities.len());
        assert_eq!(entities[1].identity(), "1.0.0.1");
    }

    #[test]
    fn empty_envelope_counts_zero() {
        let r = QueryResult::new(json!({"total": 0, "matches": []}), QueryCommand::Generic, "nothing");
        assert_eq!(r.source(), Some(Source::Shodan));
        assert!(r.is_collection());
        assert_eq!(r.element_count(), 0);
        assert!(r.canonical_entities().unwrap().is_empty());
    }

    #[test]
    fn empty_array_has_no_source() {
        let r = QueryResult::new(json!([]), QueryCommand::Generic, "nothing");
        assert_eq!(r.source(), None);
        assert!(r.is_collection());
        assert_eq!(r.element_count(), 0);
        assert!(matches!(r.canonical_entities(), Err(Error::UnsupportedSource(_))));
    }

    #[test]
    fn unknown_object_fails_closed() {
        let r = QueryResult::new(json!({"hello": "world"}), QueryCommand::Host, "x");
        assert_eq!(r.source(), None);
        assert!(matches!(r.canonical_entities(), Err(Error::UnsupportedSource(_))));
    }

    #[test]
    fn declared_source_wins_over_shape() {
        let r = QueryResult::tagged(json!([]), QueryCommand::Generic, "nothing", Source::Censys);
        assert_eq!(r.source(), Some(Source::Censys));
        assert!(r.canonical_entities().unwrap().is_empty());

        let r = QueryResult::tagged(shodan_host(), QueryCommand::Host, "8.8.8.8", Source::Shodan);
        assert_eq!(r.canonical_entities().unwrap()[0].identity(), "8.8.8.8");
    }
}
