use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pivottrack_core::{Error, Result, TrackingDefinition};

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Loads every definition file below `root`, at any depth. Only a missing
/// root fails the whole load; unreadable or invalid files are logged and
/// skipped, as are later files reusing an already loaded uuid.
pub fn load_definition_files(root: &Path) -> Result<Vec<TrackingDefinition>> {
    if !root.exists() {
        tracing::error!(path = %root.display(), "could not load tracking definitions");
        return Err(Error::Configuration(format!("definition path {} does not exist", root.display())));
    }

    let mut files = Vec::new();
    collect_files(root, &mut files).map_err(|e| Error::Configuration(format!("{}: {e}", root.display())))?;
    files.sort();
    tracing::info!(count = files.len(), path = %root.display(), "found definition files");

    let mut seen = HashSet::new();
    let mut definitions = Vec::new();
    for path in files {
        let loaded = fs::read_to_string(&path)
            .map_err(|e| Error::Configuration(e.to_string()))
            .and_then(|text| TrackingDefinition::from_yaml(&text));
        match loaded {
            Ok(definition) if !seen.insert(definition.uuid) => {
                tracing::warn!(path = %path.display(), uuid = %definition.uuid, "duplicate definition uuid, skipping file");
            }
            Ok(definition) => {
                tracing::debug!(path = %path.display(), uuid = %definition.uuid, "loaded definition file");
                definitions.push(definition);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping definition file"),
        }
    }
    tracing::info!(count = definitions.len(), "loaded tracking definitions");
    Ok(definitions)
}

fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if path.is_file() {
        if is_definition_file(path) {
            out.push(path.to_path_buf());
        }
        return Ok(());
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let p = entry.path();
        if p.is_dir() {
            collect_files(&p, out)?;
        } else if is_definition_file(&p) {
            out.push(p);
        }
    }
    Ok(())
}

fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| EXTENSIONS.contains(&e))
}
