//! Core types for pivottrack: canonical entities, query results, connector
//! capabilities, tracking definitions and the store/notifier seams.

pub mod connector;
pub mod definition;
pub mod entity;
pub mod error;
pub mod querying;
pub mod ratelimiter;
pub mod result;
pub mod sink;
pub mod source;

pub use connector::{ConnectorRegistry, HostQuery, SourceConnector};
pub use definition::{TrackingCommand, TrackingDefinition, TrackingQuery};
pub use entity::{CanonicalEntity, Domain, Host, Service};
pub use error::{Error, Result};
pub use querying::{ExpandedResult, Querying, Search};
pub use ratelimiter::RateLimiter;
pub use result::QueryResult;
pub use sink::{Notifier, OutputStore};
pub use source::{QueryCommand, Source};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
