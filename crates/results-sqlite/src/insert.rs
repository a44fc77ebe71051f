use crate::{Db, RecordId, StoredQueryResult, TrackingRecord};
use anyhow::Result;
use pivottrack_core::CanonicalEntity;
use rusqlite::params;

impl Db {
    pub fn insert_tracking_record(&self, record: &TrackingRecord) -> Result<RecordId> {
        let entity = record.entity.stripped();
        self.conn.execute(
            "INSERT INTO tracking_records(tracking_reference,definition_uuid,entity_kind,identity,entity_json,tracked_ms,definition_json) VALUES (?,?,?,?,?,?,?)",
            params![
                record.tracking_reference.to_string(),
                record.definition_uuid.to_string(),
                entity.kind(),
                entity.identity(),
                serde_json::to_string(&entity)?,
                record.tracked_ms,
                serde_json::to_string(&record.definition)?,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        if let CanonicalEntity::Host(host) = &entity {
            for d in &host.domains {
                self.conn.execute(
                    "INSERT OR IGNORE INTO record_domains(record_id,domain) VALUES (?,?)",
                    params![id, d.domain],
                )?;
            }
        }
        Ok(id)
    }

    pub fn add_query_result(&self, result: &StoredQueryResult) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO query_results(source,command,search_term,raw,payload_json,queried_ms) VALUES (?,?,?,?,?,?)",
            params![
                result.source,
                result.command,
                result.search_term,
                if result.raw { 1i64 } else { 0i64 },
                serde_json::to_string(&result.payload)?,
                result.queried_ms,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
