use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use pivottrack_core::{CanonicalEntity, Notifier, TrackingDefinition};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Appends one block per definition run with new items to a text file.
pub struct FileNotifier {
    path: PathBuf,
}

impl FileNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileNotifier { path: path.into() }
    }

    fn render(definition: &TrackingDefinition, entities: &[CanonicalEntity]) -> String {
        let at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        let mut block = format!("[{at}] New tracking results for {}:\n", definition.display_name());
        for entity in entities {
            block.push_str(&entity.identity());
            block.push('\n');
        }
        block.push('\n');
        block
    }
}

impl Notifier for FileNotifier {
    fn notify(&self, definition: &TrackingDefinition, entities: &[CanonicalEntity]) {
        if entities.is_empty() {
            return;
        }
        tracing::info!(definition = %definition.uuid, count = entities.len(), path = %self.path.display(), "writing notification");
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(Self::render(definition, entities).as_bytes()));
        if let Err(e) = written {
            tracing::error!(path = %self.path.display(), error = %e, "could not write notification");
        }
    }
}

/// Reports new items through the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, definition: &TrackingDefinition, entities: &[CanonicalEntity]) {
        if entities.is_empty() {
            return;
        }
        let items: Vec<String> = entities.iter().map(CanonicalEntity::identity).collect();
        tracing::warn!(definition = %definition.display_name(), count = items.len(), items = ?items, "new tracking results");
    }
}
