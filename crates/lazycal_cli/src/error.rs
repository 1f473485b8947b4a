//! CLI error types.

use std::path::PathBuf;

use lazycal_core::{ConfigError, DbError, LoggingError, ServiceError, ValidationError};
use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read config `{}`: {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{}`: {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] DbError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}: {}", .0.code(), .0)]
    Service(#[from] ServiceError),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code: 2 for rejected input, 3 for missing records,
    /// 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArgument(_) | Self::Validation(_) => 2,
            Self::Service(err) => match err.kind() {
                lazycal_core::ErrorKind::Validation | lazycal_core::ErrorKind::Consistency => 2,
                lazycal_core::ErrorKind::NotFound => 3,
                lazycal_core::ErrorKind::Storage => 1,
            },
            _ => 1,
        }
    }
}
