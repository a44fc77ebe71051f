use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Host-search engines pivottrack knows how to query and interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Shodan,
    Censys,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Shodan, Source::Censys];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Source::Shodan => "shodan",
            Source::Censys => "censys",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shodan" => Ok(Source::Shodan),
            "censys" => Ok(Source::Censys),
            other => Err(Error::unsupported(format!("unknown source \"{other}\""))),
        }
    }
}

/// Kind of lookup that produced a raw result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCommand {
    /// Single host lookup by identity.
    Host,
    /// Broad search with a vendor query string.
    Generic,
}

impl QueryCommand {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueryCommand::Host => "host",
            QueryCommand::Generic => "generic",
        }
    }
}

impl fmt::Display for QueryCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
