//! The tracking loop: per source, per applicable definition, run the broad
//! queries, pool their entities, let the store decide what is new while it
//! writes everything through, then notify.

use std::path::PathBuf;
use std::time::Duration;

use pivottrack_core::{
    CanonicalEntity, Error, Notifier, OutputStore, Querying, Result, Source, SourceConnector, TrackingCommand,
    TrackingDefinition, TrackingQuery,
};

use crate::loader::load_definition_files;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One full sweep over all sources, then return.
    Once,
    /// Sweep, sleep for the interval, reload definitions, repeat.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: Source,
    pub definitions: usize,
    pub pooled: usize,
    pub new_items: usize,
    /// Set when the store was unavailable and the pass stopped.
    pub aborted: bool,
}

impl SourceReport {
    fn new(source: Source, definitions: usize) -> Self {
        SourceReport { source, definitions, pooled: 0, new_items: 0, aborted: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub definitions_loaded: usize,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn new_items(&self) -> usize {
        self.sources.iter().map(|s| s.new_items).sum()
    }

    pub fn pooled(&self) -> usize {
        self.sources.iter().map(|s| s.pooled).sum()
    }
}

/// Owns the connectors, store and notifier for the duration of a run.
pub struct Tracker<S: OutputStore> {
    definitions_path: PathBuf,
    connectors: Vec<Box<dyn SourceConnector>>,
    store: S,
    notifier: Option<Box<dyn Notifier>>,
    interval: Duration,
}

impl<S: OutputStore> Tracker<S> {
    pub fn new(definitions_path: impl Into<PathBuf>, connectors: Vec<Box<dyn SourceConnector>>, store: S) -> Self {
        Tracker {
            definitions_path: definitions_path.into(),
            connectors,
            store,
            notifier: None,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs cycles until the process is stopped, or once in `RunMode::Once`.
    /// Only a missing definition root at startup is returned as an error;
    /// failures of later cycles are logged and the schedule continues.
    pub fn run(&mut self, mode: RunMode) -> Result<()> {
        if !self.definitions_path.exists() {
            return Err(Error::Configuration(format!(
                "definition path {} does not exist",
                self.definitions_path.display()
            )));
        }
        loop {
            match self.run_cycle() {
                Ok(report) => tracing::info!(
                    definitions = report.definitions_loaded,
                    pooled = report.pooled(),
                    new = report.new_items(),
                    "tracking cycle finished"
                ),
                Err(e) => tracing::error!(error = %e, "tracking cycle failed"),
            }
            if mode == RunMode::Once {
                return Ok(());
            }
            tracing::info!(secs = self.interval.as_secs(), "sleeping until next tracking cycle");
            std::thread::sleep(self.interval);
        }
    }

    /// Reloads the definitions and sweeps every source once.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let definitions = load_definition_files(&self.definitions_path)?;
        Ok(self.track_definitions(&definitions))
    }

    pub fn track_definitions(&mut self, definitions: &[TrackingDefinition]) -> CycleReport {
        let mut report = CycleReport { definitions_loaded: definitions.len(), sources: Vec::new() };
        let notifier = self.notifier.as_deref();
        for connector in self.connectors.iter_mut() {
            let applicable = definitions_by_source(definitions, connector.source());
            report.sources.push(track_definitions_for_source(&applicable, connector.as_mut(), &mut self.store, notifier));
        }
        report
    }
}

/// Definitions with at least one query for `source`, whatever its command.
pub fn definitions_by_source(definitions: &[TrackingDefinition], source: Source) -> Vec<&TrackingDefinition> {
    let applicable: Vec<&TrackingDefinition> = definitions.iter().filter(|d| d.sources().contains(&source)).collect();
    tracing::info!(source = %source, count = applicable.len(), "tracking definitions available for source");
    applicable
}

/// One source pass. Only broad (`host_generic`) queries are tracked.
pub fn track_definitions_for_source(
    definitions: &[&TrackingDefinition],
    connector: &mut dyn SourceConnector,
    store: &mut dyn OutputStore,
    notifier: Option<&dyn Notifier>,
) -> SourceReport {
    let source = connector.source();
    let mut report = SourceReport::new(source, definitions.len());
    if !store.available() {
        tracing::error!(source = %source, "store is not available, skipping source for this cycle");
        report.aborted = true;
        return report;
    }

    for definition in definitions {
        tracing::info!(source = %source, definition = %definition.uuid, "start tracking");
        let queries = definition.queries_by_filter(Some(TrackingCommand::HostGeneric), Some(source));
        let pooled = match execute_tracking_queries(&queries, connector, Some(&mut *store)) {
            Ok(pooled) => pooled,
            Err(e) => {
                tracing::error!(source = %source, error = %e, "aborting source pass");
                report.aborted = true;
                return report;
            }
        };
        tracing::info!(definition = %definition.uuid, count = pooled.len(), "collected entities");
        report.pooled += pooled.len();

        match store.tracking_output(&pooled, definition) {
            Ok(new_items) => {
                report.new_items += new_items.len();
                if let Some(n) = notifier {
                    n.notify(definition, &new_items);
                }
            }
            Err(e @ Error::StoreUnavailable(_)) => {
                tracing::error!(source = %source, error = %e, "aborting source pass");
                report.aborted = true;
                return report;
            }
            Err(e) => tracing::error!(definition = %definition.uuid, error = %e, "tracking output failed"),
        }
    }
    report
}

/// Runs each query as a search (expanded when the query asks for it) and
/// pools the resulting entities. Each non-empty search result is also kept
/// through the store's ad hoc path. Query failures are logged and skipped;
/// only an unavailable store is returned as an error.
pub fn execute_tracking_queries(
    queries: &[&TrackingQuery],
    connector: &mut dyn SourceConnector,
    mut store: Option<&mut dyn OutputStore>,
) -> Result<Vec<CanonicalEntity>> {
    let mut collected = Vec::new();
    for query in queries {
        let search = match Querying::search(&query.query, Some(&mut *connector), query.expand) {
            Ok(Some(search)) => search,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(query = %query.query, error = %e, "tracking query failed");
                continue;
            }
        };
        let entities = match search.canonical_entities() {
            Ok(entities) => entities,
            Err(e) => {
                tracing::warn!(query = %query.query, error = %e, "could not interpret query result");
                continue;
            }
        };
        if let Some(store) = store.as_deref_mut() {
            match store.query_output(&search.result, true) {
                Err(e @ Error::StoreUnavailable(_)) => return Err(e),
                Err(e) => tracing::warn!(query = %query.query, error = %e, "query output failed"),
                Ok(()) => {}
            }
        }
        tracing::debug!(query = %query.query, expanded = search.expanded.is_some(), count = entities.len(), "query executed");
        collected.extend(entities);
    }
    Ok(collected)
}
