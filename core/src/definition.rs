//! Declarative, user-authored descriptions of recurring queries.
//!
//! A definition is one YAML record:
//!
//! ```yaml
//! uuid: af8bda70-0714-4ecd-a275-7dcabaac2bf9
//! title: Default cobaltstrike servers
//! created: 2024/09/04
//! tags: [tlp.white, cobaltstrike]
//! query:
//!   - source: shodan
//!     command: host_generic
//!     query: ssl.cert.serial:146473198
//!     expand: true
//! output: sqlite
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::source::Source;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]/[month]/[day]");
/// Also accepts hand-written dates without zero padding, such as `2024/9/4`.
const DATE_INPUT: &[FormatItem<'static>] = format_description!("[year]/[month padding:none]/[day padding:none]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingCommand {
    Host,
    HostGeneric,
}

impl TrackingCommand {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackingCommand::Host => "host",
            TrackingCommand::HostGeneric => "host_generic",
        }
    }
}

impl fmt::Display for TrackingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys other than the four below are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingQuery {
    pub source: Source,
    pub command: TrackingCommand,
    pub query: String,
    #[serde(default)]
    pub expand: bool,
}

impl TrackingQuery {
    pub fn from_value(value: Value) -> Result<TrackingQuery> {
        serde_yaml::from_value(value).map_err(|e| Error::validation(format!("invalid tracking query: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingDefinition {
    pub uuid: Uuid,
    #[serde(rename = "query")]
    pub queries: Vec<TrackingQuery>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created: Option<Date>,
    #[serde(serialize_with = "serialize_date")]
    pub modified: Option<Date>,
    pub tags: Vec<String>,
    pub output: Option<String>,
}

/// Loosely typed shape of a definition record, validated field by field.
#[derive(Deserialize)]
struct DefinitionRecord {
    uuid: Option<Value>,
    query: Option<Value>,
    title: Option<String>,
    status: Option<String>,
    description: Option<String>,
    author: Option<String>,
    created: Option<Value>,
    modified: Option<Value>,
    tags: Option<Vec<String>>,
    output: Option<String>,
}

impl TrackingDefinition {
    pub fn from_yaml(text: &str) -> Result<TrackingDefinition> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| Error::validation(format!("unparsable definition: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<TrackingDefinition> {
        if !value.is_mapping() {
            return Err(Error::validation("definition must be a mapping"));
        }
        let record: DefinitionRecord =
            serde_yaml::from_value(value).map_err(|e| Error::validation(format!("invalid definition: {e}")))?;

        let uuid = match record.uuid {
            Some(Value::String(s)) => {
                Uuid::parse_str(&s).map_err(|e| Error::validation(format!("invalid uuid \"{s}\": {e}")))?
            }
            Some(_) => return Err(Error::validation("uuid must be a string")),
            None => return Err(Error::validation("missing uuid")),
        };

        let queries = match record.query {
            Some(Value::Sequence(items)) if !items.is_empty() => items
                .into_iter()
                .map(TrackingQuery::from_value)
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Sequence(_)) => return Err(Error::validation("query list is empty")),
            Some(_) => return Err(Error::validation("query must be a list")),
            None => return Err(Error::validation("missing query list")),
        };

        Ok(TrackingDefinition {
            uuid,
            queries,
            title: record.title,
            status: record.status,
            description: record.description,
            author: record.author,
            created: parse_date("created", record.created)?,
            modified: parse_date("modified", record.modified)?,
            tags: record.tags.unwrap_or_default(),
            output: record.output,
        })
    }

    pub fn sources(&self) -> BTreeSet<Source> {
        self.queries.iter().map(|q| q.source).collect()
    }

    pub fn commands(&self) -> BTreeSet<&'static str> {
        self.queries.iter().map(|q| q.command.as_str()).collect()
    }

    pub fn queries_by_source(&self, source: Source) -> Vec<&TrackingQuery> {
        self.queries_by_filter(None, Some(source))
    }

    pub fn queries_by_command(&self, command: TrackingCommand) -> Vec<&TrackingQuery> {
        self.queries_by_filter(Some(command), None)
    }

    /// Queries matching both predicates; `None` matches anything.
    pub fn queries_by_filter(&self, command: Option<TrackingCommand>, source: Option<Source>) -> Vec<&TrackingQuery> {
        self.queries
            .iter()
            .filter(|q| command.map_or(true, |c| q.command == c))
            .filter(|q| source.map_or(true, |s| q.source == s))
            .collect()
    }

    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) => format!("\"{title}\" ({})", self.uuid),
            None => self.uuid.to_string(),
        }
    }
}

fn parse_date(field: &str, value: Option<Value>) -> Result<Option<Date>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Date::parse(&s, DATE_INPUT)
            .map(Some)
            .map_err(|_| Error::validation(format!("{field} must be YYYY/MM/DD, got \"{s}\""))),
        Some(_) => Err(Error::validation(format!("{field} must be a YYYY/MM/DD string"))),
    }
}

fn serialize_date<S: Serializer>(date: &Option<Date>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match date {
        Some(d) => {
            let text = d.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
            s.serialize_some(&text)
        }
        None => s.serialize_none(),
    }
}
