use crate::{Db, StoredQueryResult, TrackingRecord};
use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

impl Db {
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    /// Whether `identity` was recorded under `definition`, either as an
    /// entity of its own or as a domain attached to a recorded host.
    pub fn identity_seen(&self, definition: &Uuid, identity: &str) -> Result<bool> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM tracking_records r
             WHERE r.definition_uuid=?1
               AND (r.identity=?2 OR EXISTS (SELECT 1 FROM record_domains d WHERE d.record_id=r.record_id AND d.domain=?2))",
            params![definition.to_string(), identity],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    pub fn count_records(&self, definition: &Uuid) -> Result<i64> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM tracking_records WHERE definition_uuid=?",
            [definition.to_string()],
            |r| r.get(0),
        )?;
        Ok(cnt)
    }

    pub fn records_for(&self, definition: &Uuid) -> Result<Vec<TrackingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT tracking_reference, entity_json, tracked_ms, definition_json FROM tracking_records WHERE definition_uuid=? ORDER BY record_id",
        )?;
        let rows = stmt.query_map([definition.to_string()], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?, r.get::<_, String>(3)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (reference, entity, tracked_ms, snapshot) = row?;
            out.push(TrackingRecord {
                tracking_reference: Uuid::parse_str(&reference)?,
                definition_uuid: *definition,
                entity: serde_json::from_str(&entity)?,
                tracked_ms,
                definition: serde_json::from_str(&snapshot)?,
            });
        }
        Ok(out)
    }

    pub fn query_results(&self, search_term: &str) -> Result<Vec<StoredQueryResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT source, command, search_term, raw, payload_json, queried_ms FROM query_results WHERE search_term=? ORDER BY result_id",
        )?;
        let rows = stmt.query_map([search_term], |r| {
            Ok((
                r.get::<_, Option<String>>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, i64>(5)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (source, command, search_term, raw, payload, queried_ms) = row?;
            out.push(StoredQueryResult { source, command, search_term, raw: raw == 1, payload: serde_json::from_str(&payload)?, queried_ms });
        }
        Ok(out)
    }
}
