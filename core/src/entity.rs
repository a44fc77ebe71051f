//! Vendor-independent host and domain records plus the per-vendor mapping
//! functions that build them from raw payloads.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::source::Source;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    pub domain: String,
}

impl Domain {
    pub fn new(domain: impl Into<String>) -> Self {
        Domain { domain: domain.into() }
    }
}

/// One exposed service observed on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub port: u16,
    pub transport: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub ip: IpAddr,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub first_seen: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_seen: Option<OffsetDateTime>,
    #[serde(default)]
    pub domains: Vec<Domain>,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
}

impl Host {
    /// Builds a host from a Shodan host document or a single search match.
    pub fn from_shodan(v: &Value) -> Result<Host> {
        let ip = match v.get("ip_str").and_then(Value::as_str) {
            Some(s) => parse_ip(s)?,
            None => match v.get("ip").and_then(Value::as_u64) {
                Some(n) if n <= u32::MAX as u64 => IpAddr::V4(Ipv4Addr::from(n as u32)),
                _ => return Err(Error::MalformedPayload("shodan record without ip".into())),
            },
        };

        let mut domains = Vec::new();
        push_names(&mut domains, v.get("hostnames"));
        push_names(&mut domains, v.get("domains"));

        let banners: Vec<&Value> = match v.get("data").and_then(Value::as_array) {
            Some(data) => data.iter().collect(),
            None if v.get("port").is_some() => vec![v],
            None => Vec::new(),
        };

        let mut seen: Vec<OffsetDateTime> = banners
            .iter()
            .filter_map(|b| b.get("timestamp").and_then(Value::as_str))
            .filter_map(parse_timestamp)
            .collect();
        if seen.is_empty() {
            seen.extend(v.get("timestamp").and_then(Value::as_str).and_then(parse_timestamp));
        }
        let last_update = v.get("last_update").and_then(Value::as_str).and_then(parse_timestamp);

        let services = banners
            .iter()
            .filter_map(|b| {
                let port = b.get("port").and_then(Value::as_u64)?;
                Some(Service {
                    port: u16::try_from(port).ok()?,
                    transport: b.get("transport").and_then(Value::as_str).map(str::to_string),
                    name: b
                        .get("product")
                        .and_then(Value::as_str)
                        .or_else(|| b.pointer("/_shodan/module").and_then(Value::as_str))
                        .map(str::to_string),
                })
            })
            .collect();

        Ok(Host {
            ip,
            first_seen: seen.iter().min().copied().or(last_update),
            last_seen: seen.iter().max().copied().or(last_update),
            domains,
            source: Source::Shodan,
            services,
        })
    }

    /// Builds a host from a Censys host view or a single search hit.
    pub fn from_censys(v: &Value) -> Result<Host> {
        let ip = v
            .get("ip")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedPayload("censys record without ip".into()))
            .and_then(parse_ip)?;

        let mut domains = Vec::new();
        push_names(&mut domains, v.pointer("/dns/names"));
        push_names(&mut domains, v.pointer("/dns/reverse_dns/names"));

        let raw_services = v.get("services").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        let services = raw_services
            .iter()
            .filter_map(|s| {
                let port = s.get("port").and_then(Value::as_u64)?;
                Some(Service {
                    port: u16::try_from(port).ok()?,
                    transport: s.get("transport_protocol").and_then(Value::as_str).map(str::to_lowercase),
                    name: s.get("service_name").and_then(Value::as_str).map(str::to_string),
                })
            })
            .collect();

        let last_updated = v.get("last_updated_at").and_then(Value::as_str).and_then(parse_timestamp);
        let first_observed = raw_services
            .iter()
            .filter_map(|s| s.get("observed_at").and_then(Value::as_str))
            .filter_map(parse_timestamp)
            .min();

        Ok(Host {
            ip,
            first_seen: first_observed.or(last_updated),
            last_seen: last_updated,
            domains,
            source: Source::Censys,
            services,
        })
    }

    pub fn from_source(source: Source, v: &Value) -> Result<Host> {
        match source {
            Source::Shodan => Host::from_shodan(v),
            Source::Censys => Host::from_censys(v),
        }
    }
}

/// Normalized record produced by interpreting a vendor payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CanonicalEntity {
    Host(Host),
    Domain(Domain),
}

impl CanonicalEntity {
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalEntity::Host(_) => "host",
            CanonicalEntity::Domain(_) => "domain",
        }
    }

    /// Key used for novelty checks: the IP of a host, the name of a domain.
    pub fn identity(&self) -> String {
        match self {
            CanonicalEntity::Host(h) => h.ip.to_string(),
            CanonicalEntity::Domain(d) => d.domain.clone(),
        }
    }

    /// The entity itself followed by every attached domain, each of which is
    /// tracked on its own.
    pub fn trackable(&self) -> Vec<CanonicalEntity> {
        let mut out = vec![self.clone()];
        if let CanonicalEntity::Host(h) = self {
            out.extend(h.domains.iter().cloned().map(CanonicalEntity::Domain));
        }
        out
    }

    /// Copy without heavy sub-fields, as written to the persisted store.
    pub fn stripped(&self) -> CanonicalEntity {
        match self {
            CanonicalEntity::Host(h) => CanonicalEntity::Host(Host { services: Vec::new(), ..h.clone() }),
            other => other.clone(),
        }
    }

    pub fn as_host(&self) -> Option<&Host> {
        match self {
            CanonicalEntity::Host(h) => Some(h),
            CanonicalEntity::Domain(_) => None,
        }
    }
}

impl From<Host> for CanonicalEntity {
    fn from(h: Host) -> Self {
        CanonicalEntity::Host(h)
    }
}

impl From<Domain> for CanonicalEntity {
    fn from(d: Domain) -> Self {
        CanonicalEntity::Domain(d)
    }
}

fn parse_ip(s: &str) -> Result<IpAddr> {
    s.parse()
        .map_err(|_| Error::MalformedPayload(format!("invalid ip address \"{s}\"")))
}

fn push_names(out: &mut Vec<Domain>, names: Option<&Value>) {
    let Some(names) = names.and_then(Value::as_array) else { return };
    for name in names.iter().filter_map(Value::as_str) {
        if !name.is_empty() && !out.iter().any(|d| d.domain == name) {
            out.push(Domain::new(name));
        }
    }
}

/// Vendor timestamps are RFC 3339, except Shodan's which omit the offset (UTC).
pub(crate) fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(&format!("{s}Z"), &Rfc3339))
        .map_err(|e| tracing::debug!(value = s, error = %e, "unparsable vendor timestamp"))
        .ok()
}
