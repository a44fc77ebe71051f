use std::collections::HashSet;

use crate::connector::{HostQuery, SourceConnector};
use crate::entity::CanonicalEntity;
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::source::{QueryCommand, Source};

/// Per-entity host lookups performed after a broad search.
#[derive(Debug, Clone, Default)]
pub struct ExpandedResult {
    pub results: Vec<QueryResult>,
}

impl ExpandedResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn canonical_entities(&self) -> Result<Vec<CanonicalEntity>> {
        let mut out = Vec::new();
        for r in &self.results {
            out.extend(r.canonical_entities()?);
        }
        Ok(out)
    }
}

/// Outcome of a broad search: the raw pass plus, when requested, its expansion.
#[derive(Debug, Clone)]
pub struct Search {
    pub result: QueryResult,
    pub expanded: Option<ExpandedResult>,
}

impl Search {
    /// Entities of the expansion when one was performed, of the raw pass otherwise.
    pub fn canonical_entities(&self) -> Result<Vec<CanonicalEntity>> {
        match &self.expanded {
            Some(expanded) => expanded.canonical_entities(),
            None => self.result.canonical_entities(),
        }
    }
}

pub struct Querying;

impl Querying {
    /// Single host lookup. `Ok(None)` when the vendor returned no data.
    pub fn host(identity: &str, connector: Option<&mut dyn SourceConnector>) -> Result<Option<QueryResult>> {
        let (source, conn) = host_capability(connector)?;
        Ok(lookup(conn, source, identity))
    }

    /// Broad search, optionally followed by one host lookup per distinct
    /// entity identity in discovery order.
    pub fn search(term: &str, connector: Option<&mut dyn SourceConnector>, expand: bool) -> Result<Option<Search>> {
        let (source, conn) = host_capability(connector)?;
        let Some(raw) = conn.query_host_search(term) else {
            tracing::info!(source = %source, query = term, "search returned no data");
            return Ok(None);
        };
        let result = QueryResult::tagged(raw, QueryCommand::Generic, term, source);
        if !expand {
            return Ok(Some(Search { result, expanded: None }));
        }

        let mut expanded = ExpandedResult::default();
        if result.element_count() > 0 {
            let mut seen = HashSet::new();
            for entity in result.canonical_entities()? {
                let identity = entity.identity();
                if !seen.insert(identity.clone()) {
                    continue;
                }
                if let Some(r) = lookup(conn, source, &identity) {
                    expanded.results.push(r);
                }
            }
        }
        tracing::debug!(query = term, expanded = expanded.len(), "expanded search result");
        Ok(Some(Search { result, expanded: Some(expanded) }))
    }
}

fn host_capability(connector: Option<&mut dyn SourceConnector>) -> Result<(Source, &mut dyn HostQuery)> {
    let conn = connector.ok_or_else(|| Error::unsupported("no connector given"))?;
    let source = conn.source();
    let query = conn
        .as_host_query()
        .ok_or_else(|| Error::unsupported(format!("did not find host query connector for \"{source}\"")))?;
    Ok((source, query))
}

fn lookup(conn: &mut dyn HostQuery, source: Source, identity: &str) -> Option<QueryResult> {
    conn.query_host(identity)
        .map(|raw| QueryResult::tagged(raw, QueryCommand::Host, identity, source))
}
