pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE tracking_records (
  record_id           INTEGER PRIMARY KEY AUTOINCREMENT,
  tracking_reference  TEXT NOT NULL UNIQUE,
  definition_uuid     TEXT NOT NULL,
  entity_kind         TEXT NOT NULL CHECK (entity_kind IN ('host','domain')),
  identity            TEXT NOT NULL,
  entity_json         TEXT NOT NULL,
  tracked_ms          INTEGER NOT NULL,
  definition_json     TEXT NOT NULL
);

CREATE TABLE record_domains (
  record_id           INTEGER NOT NULL REFERENCES tracking_records(record_id) ON DELETE CASCADE,
  domain              TEXT NOT NULL,
  PRIMARY KEY (record_id, domain)
);

CREATE TABLE query_results (
  result_id           INTEGER PRIMARY KEY AUTOINCREMENT,
  source              TEXT,
  command             TEXT NOT NULL CHECK (command IN ('host','generic')),
  search_term         TEXT NOT NULL,
  raw                 INTEGER NOT NULL CHECK (raw IN (0,1)),
  payload_json        TEXT NOT NULL,
  queried_ms          INTEGER NOT NULL
);

CREATE INDEX idx_records_scope ON tracking_records(definition_uuid, identity);
CREATE INDEX idx_record_domains_domain ON record_domains(domain);
CREATE INDEX idx_query_results_term ON query_results(command, search_term);

COMMIT;
"#
;
