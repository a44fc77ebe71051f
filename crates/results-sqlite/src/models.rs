use pivottrack_core::CanonicalEntity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RecordId = i64;

/// One persisted observation of an entity during a tracking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub tracking_reference: Uuid,
    pub definition_uuid: Uuid,
    pub entity: CanonicalEntity,
    pub tracked_ms: i64,
    /// Snapshot of the definition as it was when the record was written.
    pub definition: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredQueryResult {
    pub source: Option<String>,
    pub command: String,
    pub search_term: String,
    pub raw: bool,
    pub payload: serde_json::Value,
    pub queried_ms: i64,
}
