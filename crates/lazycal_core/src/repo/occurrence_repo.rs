//! Occurrence and exception repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist materialized occurrences and sparse exceptions of a series.
//!
//! # Invariants
//! - `(event_id, occurs_at)` is unique among occurrences.
//! - `(event_id, original_at)` is unique among exceptions; callers upsert by
//!   that key and the schema rejects duplicates.
//! - Range reads are inclusive on both ends.

use super::{
    bool_to_int, ensure_tables, parse_flag, parse_instant, parse_optional_instant, parse_text,
    parse_uuid, parse_zone, RepoError, RepoResult,
};
use crate::model::event::EventId;
use crate::model::exception::{EventException, ExceptionId, ExceptionOverrides};
use crate::model::occurrence::{EventOccurrence, OccurrenceId};
use crate::recurrence::zone::to_epoch_millis;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Params, Row};

const OCCURRENCE_SELECT_SQL: &str = "SELECT
    id,
    event_id,
    occurs_at,
    time_zone,
    status,
    created_at,
    updated_at
FROM event_occurrences";

const EXCEPTION_SELECT_SQL: &str = "SELECT
    id,
    event_id,
    occurrence_id,
    original_at,
    time_zone,
    is_deleted,
    override_start_at,
    override_end_at,
    override_title,
    override_description,
    override_location,
    override_color,
    override_transparency,
    created_at,
    updated_at
FROM event_exceptions";

/// Repository interface for per-instance series state.
pub trait OccurrenceRepository {
    fn create_occurrence(&self, occurrence: &EventOccurrence) -> RepoResult<OccurrenceId>;
    fn update_occurrence(&self, occurrence: &EventOccurrence) -> RepoResult<()>;
    fn get_occurrence(&self, id: OccurrenceId) -> RepoResult<Option<EventOccurrence>>;
    fn get_occurrence_at(
        &self,
        event_id: EventId,
        occurs_at: DateTime<Utc>,
    ) -> RepoResult<Option<EventOccurrence>>;
    fn list_occurrences(&self, event_id: EventId) -> RepoResult<Vec<EventOccurrence>>;
    fn list_occurrences_in_range(
        &self,
        event_id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<EventOccurrence>>;
    fn delete_occurrence(&self, id: OccurrenceId) -> RepoResult<()>;
    fn delete_occurrences_for_event(&self, event_id: EventId) -> RepoResult<usize>;

    fn create_exception(&self, exception: &EventException) -> RepoResult<ExceptionId>;
    fn update_exception(&self, exception: &EventException) -> RepoResult<()>;
    fn get_exception_by_original(
        &self,
        event_id: EventId,
        original_start: DateTime<Utc>,
    ) -> RepoResult<Option<EventException>>;
    fn list_exceptions_by_occurrence(
        &self,
        occurrence_id: OccurrenceId,
    ) -> RepoResult<Vec<EventException>>;
    fn list_exceptions(&self, event_id: EventId) -> RepoResult<Vec<EventException>>;
    fn list_exceptions_in_range(
        &self,
        event_id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<EventException>>;
    /// Clears the back-reference of every exception pointing at `occurrence_id`.
    fn detach_exceptions_from_occurrence(&self, occurrence_id: OccurrenceId) -> RepoResult<usize>;
    fn delete_exceptions_for_event(&self, event_id: EventId) -> RepoResult<usize>;
}

/// SQLite-backed occurrence/exception repository.
pub struct SqliteOccurrenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOccurrenceRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["event_occurrences", "event_exceptions"])?;
        Ok(Self { conn })
    }

    fn query_occurrences<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<EventOccurrence>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut occurrences = Vec::new();
        while let Some(row) = rows.next()? {
            occurrences.push(parse_occurrence_row(row)?);
        }
        Ok(occurrences)
    }

    fn query_exceptions<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<EventException>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut exceptions = Vec::new();
        while let Some(row) = rows.next()? {
            exceptions.push(parse_exception_row(row)?);
        }
        Ok(exceptions)
    }
}

impl OccurrenceRepository for SqliteOccurrenceRepository<'_> {
    fn create_occurrence(&self, occurrence: &EventOccurrence) -> RepoResult<OccurrenceId> {
        self.conn.execute(
            "INSERT INTO event_occurrences (
                id,
                event_id,
                occurs_at,
                time_zone,
                status,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                occurrence.id.to_string(),
                occurrence.event_id.to_string(),
                to_epoch_millis(occurrence.occurs_at),
                occurrence.time_zone.name(),
                occurrence.status.as_str(),
                to_epoch_millis(occurrence.created_at),
                to_epoch_millis(occurrence.updated_at),
            ],
        )?;
        Ok(occurrence.id)
    }

    fn update_occurrence(&self, occurrence: &EventOccurrence) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE event_occurrences
             SET
                occurs_at = ?1,
                time_zone = ?2,
                status = ?3,
                updated_at = ?4
             WHERE id = ?5;",
            params![
                to_epoch_millis(occurrence.occurs_at),
                occurrence.time_zone.name(),
                occurrence.status.as_str(),
                to_epoch_millis(occurrence.updated_at),
                occurrence.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::OccurrenceNotFound(occurrence.id));
        }
        Ok(())
    }

    fn get_occurrence(&self, id: OccurrenceId) -> RepoResult<Option<EventOccurrence>> {
        let mut found = self.query_occurrences(
            &format!("{OCCURRENCE_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
        )?;
        Ok(found.pop())
    }

    fn get_occurrence_at(
        &self,
        event_id: EventId,
        occurs_at: DateTime<Utc>,
    ) -> RepoResult<Option<EventOccurrence>> {
        let mut found = self.query_occurrences(
            &format!("{OCCURRENCE_SELECT_SQL} WHERE event_id = ?1 AND occurs_at = ?2;"),
            params![event_id.to_string(), to_epoch_millis(occurs_at)],
        )?;
        Ok(found.pop())
    }

    fn list_occurrences(&self, event_id: EventId) -> RepoResult<Vec<EventOccurrence>> {
        self.query_occurrences(
            &format!("{OCCURRENCE_SELECT_SQL} WHERE event_id = ?1 ORDER BY occurs_at ASC;"),
            [event_id.to_string()],
        )
    }

    fn list_occurrences_in_range(
        &self,
        event_id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<EventOccurrence>> {
        self.query_occurrences(
            &format!(
                "{OCCURRENCE_SELECT_SQL}
                 WHERE event_id = ?1 AND occurs_at >= ?2 AND occurs_at <= ?3
                 ORDER BY occurs_at ASC;"
            ),
            params![
                event_id.to_string(),
                to_epoch_millis(start),
                to_epoch_millis(end)
            ],
        )
    }

    fn delete_occurrence(&self, id: OccurrenceId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM event_occurrences WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::OccurrenceNotFound(id));
        }
        Ok(())
    }

    fn delete_occurrences_for_event(&self, event_id: EventId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM event_occurrences WHERE event_id = ?1;",
            [event_id.to_string()],
        )?;
        Ok(changed)
    }

    fn create_exception(&self, exception: &EventException) -> RepoResult<ExceptionId> {
        let fields = &exception.overrides;
        self.conn.execute(
            "INSERT INTO event_exceptions (
                id,
                event_id,
                occurrence_id,
                original_at,
                time_zone,
                is_deleted,
                override_start_at,
                override_end_at,
                override_title,
                override_description,
                override_location,
                override_color,
                override_transparency,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                exception.id.to_string(),
                exception.event_id.to_string(),
                exception.occurrence_id.map(|id| id.to_string()),
                to_epoch_millis(exception.original_start),
                exception.time_zone.name(),
                bool_to_int(exception.deleted),
                fields.start.map(to_epoch_millis),
                fields.end.map(to_epoch_millis),
                fields.title.as_deref(),
                fields.description.as_deref(),
                fields.location.as_deref(),
                fields.color.as_deref(),
                fields.transparency.map(|value| value.as_str()),
                to_epoch_millis(exception.created_at),
                to_epoch_millis(exception.updated_at),
            ],
        )?;
        Ok(exception.id)
    }

    fn update_exception(&self, exception: &EventException) -> RepoResult<()> {
        let fields = &exception.overrides;
        let changed = self.conn.execute(
            "UPDATE event_exceptions
             SET
                occurrence_id = ?1,
                original_at = ?2,
                time_zone = ?3,
                is_deleted = ?4,
                override_start_at = ?5,
                override_end_at = ?6,
                override_title = ?7,
                override_description = ?8,
                override_location = ?9,
                override_color = ?10,
                override_transparency = ?11,
                updated_at = ?12
             WHERE id = ?13;",
            params![
                exception.occurrence_id.map(|id| id.to_string()),
                to_epoch_millis(exception.original_start),
                exception.time_zone.name(),
                bool_to_int(exception.deleted),
                fields.start.map(to_epoch_millis),
                fields.end.map(to_epoch_millis),
                fields.title.as_deref(),
                fields.description.as_deref(),
                fields.location.as_deref(),
                fields.color.as_deref(),
                fields.transparency.map(|value| value.as_str()),
                to_epoch_millis(exception.updated_at),
                exception.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::ExceptionNotFound(exception.id));
        }
        Ok(())
    }

    fn get_exception_by_original(
        &self,
        event_id: EventId,
        original_start: DateTime<Utc>,
    ) -> RepoResult<Option<EventException>> {
        let mut found = self.query_exceptions(
            &format!("{EXCEPTION_SELECT_SQL} WHERE event_id = ?1 AND original_at = ?2;"),
            params![event_id.to_string(), to_epoch_millis(original_start)],
        )?;
        Ok(found.pop())
    }

    fn list_exceptions_by_occurrence(
        &self,
        occurrence_id: OccurrenceId,
    ) -> RepoResult<Vec<EventException>> {
        self.query_exceptions(
            &format!(
                "{EXCEPTION_SELECT_SQL} WHERE occurrence_id = ?1 ORDER BY original_at ASC;"
            ),
            [occurrence_id.to_string()],
        )
    }

    fn list_exceptions(&self, event_id: EventId) -> RepoResult<Vec<EventException>> {
        self.query_exceptions(
            &format!("{EXCEPTION_SELECT_SQL} WHERE event_id = ?1 ORDER BY original_at ASC;"),
            [event_id.to_string()],
        )
    }

    fn list_exceptions_in_range(
        &self,
        event_id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<EventException>> {
        self.query_exceptions(
            &format!(
                "{EXCEPTION_SELECT_SQL}
                 WHERE event_id = ?1 AND original_at >= ?2 AND original_at <= ?3
                 ORDER BY original_at ASC;"
            ),
            params![
                event_id.to_string(),
                to_epoch_millis(start),
                to_epoch_millis(end)
            ],
        )
    }

    fn detach_exceptions_from_occurrence(&self, occurrence_id: OccurrenceId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE event_exceptions SET occurrence_id = NULL WHERE occurrence_id = ?1;",
            [occurrence_id.to_string()],
        )?;
        Ok(changed)
    }

    fn delete_exceptions_for_event(&self, event_id: EventId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM event_exceptions WHERE event_id = ?1;",
            [event_id.to_string()],
        )?;
        Ok(changed)
    }
}

fn parse_occurrence_row(row: &Row<'_>) -> RepoResult<EventOccurrence> {
    let id: String = row.get("id")?;
    let event_id: String = row.get("event_id")?;
    let time_zone: String = row.get("time_zone")?;
    let status: String = row.get("status")?;
    Ok(EventOccurrence {
        id: parse_uuid(&id, "event_occurrences.id")?,
        event_id: parse_uuid(&event_id, "event_occurrences.event_id")?,
        occurs_at: parse_instant(row.get("occurs_at")?, "event_occurrences.occurs_at")?,
        time_zone: parse_zone(&time_zone, "event_occurrences.time_zone")?,
        status: parse_text(&status, "event_occurrences.status")?,
        created_at: parse_instant(row.get("created_at")?, "event_occurrences.created_at")?,
        updated_at: parse_instant(row.get("updated_at")?, "event_occurrences.updated_at")?,
    })
}

fn parse_exception_row(row: &Row<'_>) -> RepoResult<EventException> {
    let id: String = row.get("id")?;
    let event_id: String = row.get("event_id")?;
    let occurrence_id: Option<String> = row.get("occurrence_id")?;
    let time_zone: String = row.get("time_zone")?;
    let transparency: Option<String> = row.get("override_transparency")?;

    Ok(EventException {
        id: parse_uuid(&id, "event_exceptions.id")?,
        event_id: parse_uuid(&event_id, "event_exceptions.event_id")?,
        occurrence_id: occurrence_id
            .map(|value| parse_uuid(&value, "event_exceptions.occurrence_id"))
            .transpose()?,
        original_start: parse_instant(row.get("original_at")?, "event_exceptions.original_at")?,
        time_zone: parse_zone(&time_zone, "event_exceptions.time_zone")?,
        deleted: parse_flag(row.get("is_deleted")?, "event_exceptions.is_deleted")?,
        overrides: ExceptionOverrides {
            start: parse_optional_instant(
                row.get("override_start_at")?,
                "event_exceptions.override_start_at",
            )?,
            end: parse_optional_instant(
                row.get("override_end_at")?,
                "event_exceptions.override_end_at",
            )?,
            title: row.get("override_title")?,
            description: row.get("override_description")?,
            location: row.get("override_location")?,
            color: row.get("override_color")?,
            transparency: transparency
                .map(|value| parse_text(&value, "event_exceptions.override_transparency"))
                .transpose()?,
        },
        created_at: parse_instant(row.get("created_at")?, "event_exceptions.created_at")?,
        updated_at: parse_instant(row.get("updated_at")?, "event_exceptions.updated_at")?,
    })
}
