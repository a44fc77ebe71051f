use std::cell::{Cell, RefCell};
use std::fs;
use std::rc::Rc;

use pivottrack_core::{
    CanonicalEntity, Error, HostQuery, Notifier, OutputStore, QueryResult, Source, SourceConnector,
    TrackingDefinition,
};
use results_sqlite::Db;
use serde_json::{json, Value};
use tracking::{
    definitions_by_source, execute_tracking_queries, track_definitions_for_source, FileNotifier, RunMode, Tracker,
};

const UUID: &str = "af8bda70-0714-4ecd-a275-7dcabaac2bf9";

fn definition(expand: bool) -> TrackingDefinition {
    TrackingDefinition::from_yaml(&format!(
        "uuid: {UUID}\ntitle: Default cobaltstrike servers\nquery:\n  - source: shodan\n    command: host_generic\n    query: ssl.cert.serial:146473198\n    expand: {expand}\n  - source: shodan\n    command: host\n    query: 192.0.2.50\n  - source: censys\n    command: host_generic\n    query: services.tls.certificate.parsed.serial_number:146473198\n"
    ))
    .unwrap()
}

/// Answers every search with the same two hosts and every lookup with a
/// single-host record.
#[derive(Default)]
struct Scripted {
    searches: Rc<RefCell<Vec<String>>>,
    lookups: Rc<RefCell<Vec<String>>>,
}

impl HostQuery for Scripted {
    fn query_host(&mut self, host: &str) -> Option<Value> {
        self.lookups.borrow_mut().push(host.to_string());
        Some(json!({"ip_str": host, "hostnames": [], "data": [{"port": 443, "transport": "tcp"}]}))
    }

    fn query_host_search(&mut self, query: &str) -> Option<Value> {
        self.searches.borrow_mut().push(query.to_string());
        Some(json!({
            "total": 2,
            "matches": [
                {"ip_str": "198.51.100.7", "hostnames": [], "port": 443},
                {"ip_str": "198.51.100.8", "hostnames": [], "port": 50050}
            ]
        }))
    }
}

impl SourceConnector for Scripted {
    fn source(&self) -> Source {
        Source::Shodan
    }

    fn as_host_query(&mut self) -> Option<&mut dyn HostQuery> {
        Some(self)
    }
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Rc<RefCell<Vec<Vec<String>>>>,
}

impl Notifier for Recorder {
    fn notify(&self, _definition: &TrackingDefinition, entities: &[CanonicalEntity]) {
        self.calls.borrow_mut().push(entities.iter().map(CanonicalEntity::identity).collect());
    }
}

struct Offline {
    touched: bool,
}

impl OutputStore for Offline {
    fn available(&self) -> bool {
        false
    }

    fn tracking_output(&mut self, _: &[CanonicalEntity], _: &TrackingDefinition) -> pivottrack_core::Result<Vec<CanonicalEntity>> {
        self.touched = true;
        Err(Error::StoreUnavailable("offline".into()))
    }

    fn query_output(&mut self, _: &QueryResult, _: bool) -> pivottrack_core::Result<()> {
        self.touched = true;
        Err(Error::StoreUnavailable("offline".into()))
    }
}

/// Censys-tagged source answering every search with a two-hit list.
struct CensysHits;

impl HostQuery for CensysHits {
    fn query_host(&mut self, host: &str) -> Option<Value> {
        Some(json!({"ip": host}))
    }

    fn query_host_search(&mut self, _query: &str) -> Option<Value> {
        Some(json!([
            {"ip": "203.0.113.5", "services": [{"port": 443, "service_name": "HTTP"}]},
            {"ip": "203.0.113.6", "services": [{"port": 50050, "service_name": "UNKNOWN"}]}
        ]))
    }
}

impl SourceConnector for CensysHits {
    fn source(&self) -> Source {
        Source::Censys
    }

    fn as_host_query(&mut self) -> Option<&mut dyn HostQuery> {
        Some(self)
    }
}

/// Reports itself unavailable on the first check only.
struct DownOnce {
    db: Db,
    checks: Cell<usize>,
}

impl OutputStore for DownOnce {
    fn available(&self) -> bool {
        let n = self.checks.get();
        self.checks.set(n + 1);
        n > 0
    }

    fn tracking_output(
        &mut self,
        entities: &[CanonicalEntity],
        definition: &TrackingDefinition,
    ) -> pivottrack_core::Result<Vec<CanonicalEntity>> {
        self.db.tracking_output(entities, definition)
    }

    fn query_output(&mut self, result: &QueryResult, raw: bool) -> pivottrack_core::Result<()> {
        self.db.query_output(result, raw)
    }
}

#[test]
fn second_cycle_finds_nothing_new_but_keeps_writing() {
    let def = definition(false);
    let mut conn = Scripted::default();
    let mut db = Db::open_in_memory().unwrap();
    let recorder = Recorder::default();

    let first = track_definitions_for_source(&[&def], &mut conn, &mut db, Some(&recorder));
    assert_eq!(first.pooled, 2);
    assert_eq!(first.new_items, 2);
    assert_eq!(db.count_records(&def.uuid).unwrap(), 2);

    let second = track_definitions_for_source(&[&def], &mut conn, &mut db, Some(&recorder));
    assert_eq!(second.new_items, 0);
    assert!(!second.aborted);
    assert_eq!(db.count_records(&def.uuid).unwrap(), 4);

    let calls = recorder.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec!["198.51.100.7", "198.51.100.8"]);
    assert!(calls[1].is_empty());
}

#[test]
fn only_broad_queries_for_the_source_run() {
    let def = definition(false);
    let searches = Rc::new(RefCell::new(Vec::new()));
    let mut conn = Scripted { searches: searches.clone(), ..Default::default() };
    let mut db = Db::open_in_memory().unwrap();

    track_definitions_for_source(&[&def], &mut conn, &mut db, None);
    assert_eq!(*searches.borrow(), vec!["ssl.cert.serial:146473198"]);
    assert!(conn.lookups.borrow().is_empty());
}

#[test]
fn expanded_queries_pool_lookup_results() {
    let def = definition(true);
    let lookups = Rc::new(RefCell::new(Vec::new()));
    let mut conn = Scripted { lookups: lookups.clone(), ..Default::default() };
    let mut db = Db::open_in_memory().unwrap();

    let queries = def.queries_by_source(Source::Shodan);
    let generic: Vec<_> = queries.into_iter().filter(|q| q.expand).collect();
    let pooled = execute_tracking_queries(&generic, &mut conn, Some(&mut db)).unwrap();

    assert_eq!(*lookups.borrow(), vec!["198.51.100.7", "198.51.100.8"]);
    assert_eq!(pooled.len(), 2);
    assert_eq!(pooled[0].as_host().unwrap().services.len(), 1);
    // the first pass is kept raw, once per executed query
    let stored = db.query_results("ssl.cert.serial:146473198").unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].raw);
    assert_eq!(stored[0].payload["total"], 2);
}

#[test]
fn unavailable_store_skips_the_source() {
    let def = definition(false);
    let searches = Rc::new(RefCell::new(Vec::new()));
    let mut conn = Scripted { searches: searches.clone(), ..Default::default() };
    let mut store = Offline { touched: false };
    let recorder = Recorder::default();

    let report = track_definitions_for_source(&[&def], &mut conn, &mut store, Some(&recorder));
    assert!(report.aborted);
    assert_eq!(report.new_items, 0);
    assert!(!store.touched);
    assert!(searches.borrow().is_empty());
    assert!(recorder.calls.borrow().is_empty());
}

#[test]
fn unavailable_store_only_aborts_its_own_source() {
    let def = definition(false);
    let shodan_searches = Rc::new(RefCell::new(Vec::new()));
    let connectors: Vec<Box<dyn SourceConnector>> = vec![
        Box::new(Scripted { searches: shodan_searches.clone(), ..Default::default() }),
        Box::new(CensysHits),
    ];
    let store = DownOnce { db: Db::open_in_memory().unwrap(), checks: Cell::new(0) };
    let recorder = Recorder::default();
    let mut tracker = Tracker::new("unused", connectors, store).with_notifier(Box::new(recorder.clone()));

    let report = tracker.track_definitions(std::slice::from_ref(&def));
    assert_eq!(report.sources.len(), 2);

    let shodan = &report.sources[0];
    assert_eq!(shodan.source, Source::Shodan);
    assert!(shodan.aborted);
    assert_eq!(shodan.pooled, 0);
    assert!(shodan_searches.borrow().is_empty());

    let censys = &report.sources[1];
    assert_eq!(censys.source, Source::Censys);
    assert!(!censys.aborted);
    assert_eq!(censys.pooled, 2);
    assert_eq!(censys.new_items, 2);

    let records = tracker.store().db.records_for(&def.uuid).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.entity.as_host().unwrap().source == Source::Censys));
    assert_eq!(*recorder.calls.borrow(), vec![vec!["203.0.113.5".to_string(), "203.0.113.6".to_string()]]);
}

#[test]
fn definitions_are_selected_per_source() {
    let other = TrackingDefinition::from_yaml(
        "uuid: 0b6a4f8e-2b8f-4d43-8f57-0e0e9d5d8c11\nquery:\n  - source: censys\n    command: host\n    query: 192.0.2.1\n",
    )
    .unwrap();
    let defs = vec![definition(false), other];
    assert_eq!(definitions_by_source(&defs, Source::Shodan).len(), 1);
    assert_eq!(definitions_by_source(&defs, Source::Censys).len(), 2);
}

#[test]
fn tracker_runs_once_from_a_definition_directory() {
    let dir = tempfile::tempdir().unwrap();
    let defs = dir.path().join("definitions");
    fs::create_dir(&defs).unwrap();
    fs::write(
        defs.join("cobalt.yml"),
        format!("uuid: {UUID}\ntitle: cobalt\nquery:\n  - source: shodan\n    command: host_generic\n    query: q\n"),
    )
    .unwrap();
    fs::write(defs.join("broken.yaml"), "uuid: nope\n").unwrap();
    let notes = dir.path().join("notifications.txt");

    let connectors: Vec<Box<dyn SourceConnector>> = vec![Box::new(Scripted::default())];
    let mut tracker = Tracker::new(&defs, connectors, Db::open_in_memory().unwrap())
        .with_notifier(Box::new(FileNotifier::new(&notes)));
    tracker.run(RunMode::Once).unwrap();

    let text = fs::read_to_string(&notes).unwrap();
    assert!(text.contains("New tracking results for \"cobalt\""));
    assert!(text.contains("198.51.100.7\n198.51.100.8\n"));
    let uuid = UUID.parse().unwrap();
    assert_eq!(tracker.store().count_records(&uuid).unwrap(), 2);

    let report = tracker.run_cycle().unwrap();
    assert_eq!(report.definitions_loaded, 1);
    assert_eq!(report.pooled(), 2);
    assert_eq!(report.new_items(), 0);
}

#[test]
fn missing_definition_root_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut tracker = Tracker::new(dir.path().join("absent"), Vec::new(), Db::open_in_memory().unwrap());
    assert!(matches!(tracker.run(RunMode::Once), Err(Error::Configuration(_))));
}
