//! CLI configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/lazycal/config.toml` by default. A missing default file means
//! defaults; a missing explicit `--config` file is an error.

use std::path::{Path, PathBuf};

use lazycal_core::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Configuration for the lazycal CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Database location.
    pub storage: StorageSettings,

    /// File logging; disabled unless `log_dir` is set.
    pub logging: LoggingSettings,

    /// Recurrence engine tunables.
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite file; defaults to `<data dir>/lazycal/lazycal.db`.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace|debug|info|warn|error`; defaults to the build-mode level.
    pub level: Option<String>,

    /// Absolute directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default path when `None`.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lazycal")
            .join("config.toml")
    }

    /// Returns the configured database path or the per-user default.
    pub fn database_path(&self) -> PathBuf {
        self.storage.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("lazycal")
                .join("lazycal.db")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CliConfig;
    use crate::error::CliError;
    use std::path::PathBuf;

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\ndatabase_path = \"/tmp/cal.db\"\n\n[engine]\nhorizon_months = 6\n",
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/cal.db"));
        assert_eq!(config.engine.horizon_months, 6);
        assert_eq!(config.engine.max_page_size, 100);
        assert_eq!(config.logging.log_dir, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, CliError::ReadConfig { .. }));
    }

    #[test]
    fn invalid_engine_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\nhorizon_months = 0\n").unwrap();

        let err = CliConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine\n").unwrap();

        let err = CliConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::ParseConfig { .. }));
    }
}
