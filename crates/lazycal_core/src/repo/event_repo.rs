//! Event, rule and reminder repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `events`, `recurrence_rules` and `event_reminders`.
//! - Answer owner-scoped candidate listing for range queries.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - An event has at most one rule (`recurrence_rules.event_id` is unique).
//! - Deleting an event requires its dependents to be gone first; the schema
//!   has no cascading deletes.

use super::{
    bool_to_int, ensure_tables, parse_flag, parse_instant, parse_optional_instant, parse_text,
    parse_uuid, parse_zone, RepoError, RepoResult,
};
use crate::model::event::{Event, EventId, EventType, UserId};
use crate::model::recurrence::{
    format_numbers, format_weekdays, parse_numbers, parse_weekdays, RecurrenceRule, RuleId,
};
use crate::model::reminder::{Reminder, ReminderId};
use crate::recurrence::validator::validate_rule_shape;
use crate::recurrence::zone::to_epoch_millis;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    title,
    description,
    location,
    color,
    event_type,
    start_at,
    end_at,
    time_zone,
    all_day,
    transparency,
    created_at,
    updated_at
FROM events";

const RULE_SELECT_SQL: &str = "SELECT
    id,
    event_id,
    frequency,
    interval,
    by_weekday,
    by_month,
    by_month_day,
    count,
    until_at
FROM recurrence_rules";

/// Owner-scoped filter for range listing.
///
/// An event is a candidate when its own span overlaps
/// `[range_start, range_end]`, when it carries a rule that starts before
/// `range_end` and has not ended before `range_start`, or when one of its
/// live exceptions moves an occurrence into the range. Candidates are a
/// superset; the query service drops series with nothing left in range.
#[derive(Debug, Clone)]
pub struct EventListFilter {
    pub owner_id: UserId,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub event_type: Option<EventType>,
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for events and their owned rule/reminders.
pub trait EventRepository {
    fn create_event(&self, event: &Event) -> RepoResult<EventId>;
    fn update_event(&self, event: &Event) -> RepoResult<()>;
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>>;
    fn delete_event(&self, id: EventId) -> RepoResult<()>;
    fn list_events(&self, filter: &EventListFilter) -> RepoResult<Vec<Event>>;
    fn count_events(&self, filter: &EventListFilter) -> RepoResult<u64>;

    fn create_rule(&self, rule: &RecurrenceRule) -> RepoResult<RuleId>;
    fn get_rule_for_event(&self, event_id: EventId) -> RepoResult<Option<RecurrenceRule>>;
    /// Returns whether a rule existed.
    fn delete_rule_for_event(&self, event_id: EventId) -> RepoResult<bool>;
    /// Returns whether a rule existed.
    fn set_rule_until(&self, event_id: EventId, until: Option<DateTime<Utc>>) -> RepoResult<bool>;

    fn create_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId>;
    fn list_reminders(&self, event_id: EventId) -> RepoResult<Vec<Reminder>>;
    fn delete_reminders_for_event(&self, event_id: EventId) -> RepoResult<usize>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["events", "recurrence_rules", "event_reminders"])?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;

        self.conn.execute(
            "INSERT INTO events (
                id,
                owner_id,
                title,
                description,
                location,
                color,
                event_type,
                start_at,
                end_at,
                time_zone,
                all_day,
                transparency,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                event.id.to_string(),
                event.owner_id.to_string(),
                event.title.as_str(),
                event.description.as_deref(),
                event.location.as_deref(),
                event.color.as_deref(),
                event.event_type.as_str(),
                to_epoch_millis(event.start),
                to_epoch_millis(event.end),
                event.time_zone.name(),
                bool_to_int(event.all_day),
                event.transparency.as_str(),
                to_epoch_millis(event.created_at),
                to_epoch_millis(event.updated_at),
            ],
        )?;

        Ok(event.id)
    }

    fn update_event(&self, event: &Event) -> RepoResult<()> {
        event.validate()?;

        let changed = self.conn.execute(
            "UPDATE events
             SET
                title = ?1,
                description = ?2,
                location = ?3,
                color = ?4,
                event_type = ?5,
                start_at = ?6,
                end_at = ?7,
                time_zone = ?8,
                all_day = ?9,
                transparency = ?10,
                updated_at = ?11
             WHERE id = ?12;",
            params![
                event.title.as_str(),
                event.description.as_deref(),
                event.location.as_deref(),
                event.color.as_deref(),
                event.event_type.as_str(),
                to_epoch_millis(event.start),
                to_epoch_millis(event.end),
                event.time_zone.name(),
                bool_to_int(event.all_day),
                event.transparency.as_str(),
                to_epoch_millis(event.updated_at),
                event.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::EventNotFound(event.id));
        }
        Ok(())
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_event_row(row)?));
        }
        Ok(None)
    }

    fn delete_event(&self, id: EventId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::EventNotFound(id));
        }
        Ok(())
    }

    fn list_events(&self, filter: &EventListFilter) -> RepoResult<Vec<Event>> {
        let (where_sql, mut bind_values) = candidate_clause(filter);
        let mut sql = format!("{EVENT_SELECT_SQL} {where_sql} ORDER BY start_at ASC, id ASC");

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if filter.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(filter.offset)));
            }
        } else if filter.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(filter.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    fn count_events(&self, filter: &EventListFilter) -> RepoResult<u64> {
        let (where_sql, bind_values) = candidate_clause(filter);
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM events {where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative event count `{total}`")))
    }

    fn create_rule(&self, rule: &RecurrenceRule) -> RepoResult<RuleId> {
        validate_rule_shape(rule)?;

        self.conn.execute(
            "INSERT INTO recurrence_rules (
                id,
                event_id,
                frequency,
                interval,
                by_weekday,
                by_month,
                by_month_day,
                count,
                until_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                rule.id.to_string(),
                rule.event_id.to_string(),
                rule.frequency.as_str(),
                rule.interval,
                format_weekdays(&rule.by_weekday),
                format_numbers(&rule.by_month),
                format_numbers(&rule.by_month_day),
                rule.count,
                rule.until.map(to_epoch_millis),
            ],
        )?;

        Ok(rule.id)
    }

    fn get_rule_for_event(&self, event_id: EventId) -> RepoResult<Option<RecurrenceRule>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RULE_SELECT_SQL} WHERE event_id = ?1;"))?;
        let mut rows = stmt.query([event_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_rule_row(row)?));
        }
        Ok(None)
    }

    fn delete_rule_for_event(&self, event_id: EventId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM recurrence_rules WHERE event_id = ?1;",
            [event_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn set_rule_until(&self, event_id: EventId, until: Option<DateTime<Utc>>) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE recurrence_rules SET until_at = ?1 WHERE event_id = ?2;",
            params![until.map(to_epoch_millis), event_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn create_reminder(&self, reminder: &Reminder) -> RepoResult<ReminderId> {
        self.conn.execute(
            "INSERT INTO event_reminders (
                id,
                event_id,
                method,
                minutes_before,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                reminder.id.to_string(),
                reminder.event_id.to_string(),
                reminder.method.as_str(),
                reminder.minutes_before,
                to_epoch_millis(reminder.created_at),
            ],
        )?;
        Ok(reminder.id)
    }

    fn list_reminders(&self, event_id: EventId) -> RepoResult<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, method, minutes_before, created_at
             FROM event_reminders
             WHERE event_id = ?1
             ORDER BY minutes_before DESC, id ASC;",
        )?;
        let mut rows = stmt.query([event_id.to_string()])?;
        let mut reminders = Vec::new();
        while let Some(row) = rows.next()? {
            reminders.push(parse_reminder_row(row)?);
        }
        Ok(reminders)
    }

    fn delete_reminders_for_event(&self, event_id: EventId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM event_reminders WHERE event_id = ?1;",
            [event_id.to_string()],
        )?;
        Ok(changed)
    }
}

/// Returns whether an event row with `id` exists.
pub fn event_exists(conn: &Connection, id: EventId) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM events WHERE id = ?1;",
            [id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn candidate_clause(filter: &EventListFilter) -> (String, Vec<Value>) {
    let range_start = to_epoch_millis(filter.range_start);
    let range_end = to_epoch_millis(filter.range_end);
    let mut sql = String::from(
        "WHERE owner_id = ?
           AND (
                (start_at <= ?
                 AND (
                    (NOT EXISTS (SELECT 1 FROM recurrence_rules r WHERE r.event_id = events.id)
                     AND end_at >= ?)
                    OR EXISTS (
                        SELECT 1
                        FROM recurrence_rules r
                        WHERE r.event_id = events.id
                          AND (r.until_at IS NULL OR r.until_at > ?)
                    )
                 ))
                OR EXISTS (
                    SELECT 1
                    FROM event_exceptions x
                    WHERE x.event_id = events.id
                      AND x.is_deleted = 0
                      AND x.override_start_at BETWEEN ? AND ?
                )
           )",
    );
    let mut bind_values = vec![
        Value::Text(filter.owner_id.to_string()),
        Value::Integer(range_end),
        Value::Integer(range_start),
        Value::Integer(range_start),
        Value::Integer(range_start),
        Value::Integer(range_end),
    ];

    if let Some(kind) = filter.event_type {
        sql.push_str(" AND event_type = ?");
        bind_values.push(Value::Text(kind.as_str().to_string()));
    }

    if let Some(search) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        sql.push_str(
            " AND (title LIKE ? ESCAPE '\\'
                   OR IFNULL(description, '') LIKE ? ESCAPE '\\')",
        );
        let pattern = format!("%{}%", escape_like(search));
        bind_values.push(Value::Text(pattern.clone()));
        bind_values.push(Value::Text(pattern));
    }

    (sql, bind_values)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let id: String = row.get("id")?;
    let owner_id: String = row.get("owner_id")?;
    let event_type: String = row.get("event_type")?;
    let time_zone: String = row.get("time_zone")?;
    let transparency: String = row.get("transparency")?;

    let event = Event {
        id: parse_uuid(&id, "events.id")?,
        owner_id: parse_uuid(&owner_id, "events.owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        location: row.get("location")?,
        color: row.get("color")?,
        event_type: parse_text(&event_type, "events.event_type")?,
        start: parse_instant(row.get("start_at")?, "events.start_at")?,
        end: parse_instant(row.get("end_at")?, "events.end_at")?,
        time_zone: parse_zone(&time_zone, "events.time_zone")?,
        all_day: parse_flag(row.get("all_day")?, "events.all_day")?,
        transparency: parse_text(&transparency, "events.transparency")?,
        created_at: parse_instant(row.get("created_at")?, "events.created_at")?,
        updated_at: parse_instant(row.get("updated_at")?, "events.updated_at")?,
    };
    event
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("event {}: {err}", event.id)))?;
    Ok(event)
}

fn parse_rule_row(row: &Row<'_>) -> RepoResult<RecurrenceRule> {
    let id: String = row.get("id")?;
    let event_id: String = row.get("event_id")?;
    let frequency: String = row.get("frequency")?;
    let by_weekday: String = row.get("by_weekday")?;
    let by_month: String = row.get("by_month")?;
    let by_month_day: String = row.get("by_month_day")?;

    let rule = RecurrenceRule {
        id: parse_uuid(&id, "recurrence_rules.id")?,
        event_id: parse_uuid(&event_id, "recurrence_rules.event_id")?,
        frequency: parse_text(&frequency, "recurrence_rules.frequency")?,
        interval: row.get("interval")?,
        by_weekday: parse_weekdays(&by_weekday).map_err(|err| {
            RepoError::InvalidData(format!("recurrence_rules.by_weekday: {err}"))
        })?,
        by_month: parse_numbers(&by_month, "month")
            .map_err(|err| RepoError::InvalidData(format!("recurrence_rules.by_month: {err}")))?,
        by_month_day: parse_numbers(&by_month_day, "day of month").map_err(|err| {
            RepoError::InvalidData(format!("recurrence_rules.by_month_day: {err}"))
        })?,
        count: row.get("count")?,
        until: parse_optional_instant(row.get("until_at")?, "recurrence_rules.until_at")?,
    };
    validate_rule_shape(&rule)
        .map_err(|err| RepoError::InvalidData(format!("rule {}: {err}", rule.id)))?;
    Ok(rule)
}

fn parse_reminder_row(row: &Row<'_>) -> RepoResult<Reminder> {
    let id: String = row.get("id")?;
    let event_id: String = row.get("event_id")?;
    let method: String = row.get("method")?;
    Ok(Reminder {
        id: parse_uuid(&id, "event_reminders.id")?,
        event_id: parse_uuid(&event_id, "event_reminders.event_id")?,
        method: parse_text(&method, "event_reminders.method")?,
        minutes_before: row.get("minutes_before")?,
        created_at: parse_instant(row.get("created_at")?, "event_reminders.created_at")?,
    })
}
