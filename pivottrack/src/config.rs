use censys_connector::CensysConfig;
use pivottrack_core::{Error, Result};
use serde::Deserialize;
use shodan_connector::ShodanConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "pivottrack.yaml";
pub const DEFAULT_STORE: &str = "pivottrack.db";
pub const DEFAULT_DEFINITIONS: &str = "definitions";

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectorsConfig {
    pub shodan: ShodanConfig,
    pub censys: CensysConfig,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct TrackingConfig {
    /// Directory (or single file) holding definition YAML files.
    pub definitions: Option<PathBuf>,
    pub interval_secs: Option<u64>,
    pub notification_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub connectors: ConnectorsConfig,
    pub store: StoreConfig,
    pub tracking: TrackingConfig,
}

impl Config {
    pub fn store_path(&self) -> PathBuf {
        self.store.path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_STORE))
    }

    pub fn definitions_path(&self) -> PathBuf {
        self.tracking.definitions.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DEFINITIONS))
    }
}

/// Loads `path`, or `./pivottrack.yaml` when no path is given. Only an
/// explicitly named file has to exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(Error::Configuration(format!("config file {} does not exist", p.display())));
        }
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path)
        .map_err(|e| Error::Configuration(format!("cannot read {}: {e}", path.display())))?;
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&s).map_err(|e| Error::Configuration(format!("invalid config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pivottrack.yaml");
        fs::write(
            &path,
            "connectors:\n  shodan:\n    api_key: abc\n    rate_limit: 0.5\n  censys:\n    api_id: id\n    api_secret: secret\nstore:\n  path: /tmp/pt.db\ntracking:\n  definitions: defs\n  interval_secs: 600\n  notification_file: notes.txt\n",
        )
        .unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.connectors.shodan.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.connectors.shodan.rate_limit, Some(0.5));
        assert_eq!(cfg.connectors.censys.api_secret.as_deref(), Some("secret"));
        assert_eq!(cfg.store_path(), PathBuf::from("/tmp/pt.db"));
        assert_eq!(cfg.definitions_path(), PathBuf::from("defs"));
        assert_eq!(cfg.tracking.interval_secs, Some(600));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.yaml");
        fs::write(&path, "connectors:\n  shodan:\n    api_key: abc\n").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert!(cfg.connectors.censys.api_id.is_none());
        assert_eq!(cfg.store_path(), PathBuf::from(DEFAULT_STORE));
    }

    #[test]
    fn explicit_missing_or_broken_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(matches!(load_config(Some(&missing)), Err(Error::Configuration(_))));

        let broken = dir.path().join("broken.yaml");
        fs::write(&broken, "connectors: [unclosed\n").unwrap();
        assert!(matches!(load_config(Some(&broken)), Err(Error::Configuration(_))));
    }
}
