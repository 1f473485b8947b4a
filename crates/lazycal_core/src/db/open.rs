//! Connection bootstrap for the calendar store.
//!
//! # Invariants
//! - Returned connections enforce foreign keys, wait up to 5 s on a locked
//!   database and carry the latest calendar schema.

use super::migrations::{apply_migrations, schema_version};
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) a calendar database file.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    bootstrap("file", Connection::open(path))
}

/// Opens a private in-memory calendar database, mainly for tests.
pub fn open_db_in_memory() -> DbResult<Connection> {
    bootstrap("memory", Connection::open_in_memory())
}

fn bootstrap(mode: &'static str, opened: rusqlite::Result<Connection>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let outcome: DbResult<(Connection, usize, u32)> =
        opened.map_err(DbError::from).and_then(|mut conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            let applied = apply_migrations(&mut conn)?;
            let version = schema_version(&conn)?;
            Ok((conn, applied, version))
        });

    match outcome {
        Ok((conn, applied, version)) => {
            info!(
                "event=db_open module=db status=ok mode={mode} schema_version={version} migrations_applied={applied} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}
