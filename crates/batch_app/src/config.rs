use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use batch_engine::{
    AtomicFileWriter, EngineConfig, PersistError, ProcessorSettings, DEFAULT_BUNDLE_FILENAME,
    DEFAULT_CONCURRENCY,
};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILENAME: &str = "image-batch.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error("failed to write settings: {0}")]
    Write(#[from] PersistError),
}

/// User settings, stored as RON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Hard cap per item including queueing inside the client; 0 disables it.
    pub item_timeout_secs: u64,
    pub max_response_bytes: u64,
    pub concurrency: usize,
    pub output_dir: PathBuf,
    pub bundle_filename: String,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let processor = ProcessorSettings::default();
        let engine = EngineConfig::default();
        Self {
            endpoint: processor.endpoint,
            connect_timeout_secs: processor.connect_timeout.as_secs(),
            request_timeout_secs: processor.request_timeout.as_secs(),
            item_timeout_secs: engine.item_timeout.map_or(0, |t| t.as_secs()),
            max_response_bytes: processor.max_response_bytes,
            concurrency: DEFAULT_CONCURRENCY,
            output_dir: PathBuf::from("output"),
            bundle_filename: DEFAULT_BUNDLE_FILENAME.to_string(),
            log_destination: LogDestination::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads settings from `path`. `Ok(None)` means there is no file.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Writes the settings as pretty RON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<PathBuf, ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILENAME.to_string());
        Ok(AtomicFileWriter::new(dir).write(&filename, content.as_bytes())?)
    }

    /// Level named by `log_level`, or `Info` when it is not a level name.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(self.log_level.trim()).unwrap_or(LevelFilter::Info)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            processor: ProcessorSettings {
                endpoint: self.endpoint.clone(),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_response_bytes: self.max_response_bytes,
            },
            concurrency: self.concurrency,
            item_timeout: (self.item_timeout_secs > 0)
                .then(|| Duration::from_secs(self.item_timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(&dir.path().join("absent.ron")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.ron");
        fs::write(&path, r#"(endpoint: "http://example.test/api/image/process", concurrency: 2)"#)
            .unwrap();

        let config = AppConfig::load(&path).unwrap().unwrap();
        assert_eq!(config.endpoint, "http://example.test/api/image/process");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.bundle_filename, "images.zip");
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn garbage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        fs::write(&path, "not ron at all (").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image-batch.ron");
        let config = AppConfig {
            log_destination: LogDestination::Both,
            item_timeout_secs: 0,
            ..AppConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.engine_config().item_timeout, None);
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let config = AppConfig {
            log_level: "chatty".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::Info);
        let config = AppConfig {
            log_level: "debug".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), LevelFilter::Debug);
    }
}
