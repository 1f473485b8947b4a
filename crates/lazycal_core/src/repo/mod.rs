//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for series storage.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories never open transactions; callers construct them over a
//!   `Transaction` (which derefs to `Connection`) to group writes.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic `NotFound` errors in addition to DB
//!   transport errors.

use crate::db::DbError;
use crate::model::event::EventId;
use crate::model::exception::ExceptionId;
use crate::model::occurrence::OccurrenceId;
use crate::model::validation::ValidationError;
use crate::recurrence::zone::{from_epoch_millis, parse_time_zone};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub mod event_repo;
pub mod occurrence_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for series persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    /// Connection was not opened through `open_db*` (schema missing).
    #[error("connection is not initialized: missing table `{0}`")]
    UninitializedConnection(&'static str),
    #[error("event not found: {0}")]
    EventNotFound(EventId),
    #[error("occurrence not found: {0}")]
    OccurrenceNotFound(OccurrenceId),
    #[error("exception not found: {0}")]
    ExceptionNotFound(ExceptionId),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::UninitializedConnection(table));
        }
    }
    Ok(())
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_instant(millis: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    from_epoch_millis(millis)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid instant `{millis}` in {column}")))
}

fn parse_optional_instant(millis: Option<i64>, column: &str) -> RepoResult<Option<DateTime<Utc>>> {
    millis.map(|value| parse_instant(value, column)).transpose()
}

fn parse_zone(value: &str, column: &str) -> RepoResult<Tz> {
    parse_time_zone(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid time zone `{value}` in {column}")))
}

fn parse_text<T: FromStr>(value: &str, column: &str) -> RepoResult<T> {
    value
        .parse::<T>()
        .map_err(|_| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
