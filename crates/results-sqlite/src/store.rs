use std::collections::HashSet;

use crate::{Db, StoredQueryResult, TrackingRecord};
use pivottrack_core::{CanonicalEntity, Error, OutputStore, QueryResult, TrackingDefinition};
use time::OffsetDateTime;
use uuid::Uuid;

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn unavailable(e: anyhow::Error) -> Error {
    tracing::error!(error = %e, "sqlite store failure");
    Error::StoreUnavailable(e.to_string())
}

impl Db {
    /// Novelty check followed by write-through of every entity, in one
    /// transaction. Check and write are not atomic with respect to other
    /// writers of the same definition.
    pub fn track(&self, entities: &[CanonicalEntity], definition: &TrackingDefinition) -> anyhow::Result<Vec<CanonicalEntity>> {
        let mut new_items = Vec::new();
        let mut checked = HashSet::new();
        for entity in entities {
            for candidate in entity.trackable() {
                let identity = candidate.identity();
                if !checked.insert(identity.clone()) {
                    continue;
                }
                if !self.identity_seen(&definition.uuid, &identity)? {
                    tracing::debug!(definition = %definition.uuid, identity = %identity, "new tracking item");
                    new_items.push(candidate);
                }
            }
        }

        let snapshot = serde_json::to_value(definition)?;
        let tracked_ms = now_ms();
        let tx = self.conn.unchecked_transaction()?;
        for entity in entities {
            self.insert_tracking_record(&TrackingRecord {
                tracking_reference: Uuid::new_v4(),
                definition_uuid: definition.uuid,
                entity: entity.clone(),
                tracked_ms,
                definition: snapshot.clone(),
            })?;
        }
        tx.commit()?;
        tracing::info!(definition = %definition.uuid, written = entities.len(), new = new_items.len(), "tracking output stored");
        Ok(new_items)
    }
}

impl OutputStore for Db {
    fn available(&self) -> bool {
        self.conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)).is_ok()
    }

    fn tracking_output(
        &mut self,
        entities: &[CanonicalEntity],
        definition: &TrackingDefinition,
    ) -> pivottrack_core::Result<Vec<CanonicalEntity>> {
        self.track(entities, definition).map_err(unavailable)
    }

    fn query_output(&mut self, result: &QueryResult, raw: bool) -> pivottrack_core::Result<()> {
        let payload = if raw {
            result.raw().clone()
        } else {
            let entities: Vec<CanonicalEntity> = result.canonical_entities()?.iter().map(CanonicalEntity::stripped).collect();
            serde_json::to_value(entities).map_err(|e| Error::MalformedPayload(e.to_string()))?
        };
        self.add_query_result(&StoredQueryResult {
            source: result.source().map(|s| s.to_string()),
            command: result.command().to_string(),
            search_term: result.search_term().to_string(),
            raw,
            payload,
            queried_ms: now_ms(),
        })
        .map(|_| ())
        .map_err(unavailable)
    }
}
