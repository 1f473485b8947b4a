//! Series mutation use-cases.
//!
//! # Responsibility
//! - Create, reschedule and delete series together with their rule,
//!   materialized occurrences, exceptions and reminders.
//! - Edit or suppress single occurrences through sparse exceptions.
//!
//! # Invariants
//! - Every write path runs in exactly one `IMMEDIATE` transaction; any error
//!   drops the transaction, which rolls back the whole unit.
//! - Validation happens before the transaction opens wherever the input
//!   alone decides it.
//! - At most one exception exists per `(event, original instant)`; edits
//!   upsert by that key.
//! - Single-occurrence paths never delete occurrence rows.
//! - Change publication happens after commit and never fails the write.

use crate::config::EngineConfig;
use crate::error::{OccurrenceRef, ServiceError, ServiceResult};
use crate::model::event::{validate_time_range, Event, EventId, UserId};
use crate::model::exception::{EventException, ExceptionOverrides};
use crate::model::occurrence::{EventOccurrence, OccurrenceId, OccurrenceStatus};
use crate::model::recurrence::RecurrenceRule;
use crate::model::reminder::Reminder;
use crate::model::validation::ValidationError;
use crate::recurrence::zone::{truncate_to_millis, with_time_of};
use crate::recurrence::{validate_rule, OccurrenceGenerator};
use crate::repo::event_repo::{EventRepository, SqliteEventRepository};
use crate::repo::occurrence_repo::{OccurrenceRepository, SqliteOccurrenceRepository};
use crate::service::notify::{ChangePublisher, NoopPublisher, SeriesChange};
use crate::service::request::{CreateEventRequest, OccurrenceUpdate, UpdateEventRequest};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Result of a single-occurrence edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccurrenceEdit {
    /// Materialized row after the edit, if one exists.
    pub occurrence: Option<EventOccurrence>,
    /// Exception after the edit; `None` for a status-only change.
    pub exception: Option<EventException>,
}

/// One occurrence slot resolved from a caller reference.
#[derive(Debug, Clone)]
struct OccurrenceTarget {
    original_start: DateTime<Utc>,
    occurrence: Option<EventOccurrence>,
}

impl OccurrenceTarget {
    fn occurrence_id(&self) -> Option<OccurrenceId> {
        self.occurrence.as_ref().map(|occurrence| occurrence.id)
    }

    fn time_zone(&self, event: &Event) -> Tz {
        self.occurrence
            .as_ref()
            .map_or(event.time_zone, |occurrence| occurrence.time_zone)
    }
}

/// Write-side service of the recurrence engine.
pub struct SeriesService<'conn> {
    conn: &'conn Connection,
    generator: OccurrenceGenerator,
    publisher: Arc<dyn ChangePublisher>,
}

impl<'conn> SeriesService<'conn> {
    /// Creates a service over a migrated connection.
    ///
    /// # Errors
    /// - `Storage` when the connection has not been migrated.
    pub fn try_new(conn: &'conn Connection, config: &EngineConfig) -> ServiceResult<Self> {
        SqliteEventRepository::try_new(conn)?;
        SqliteOccurrenceRepository::try_new(conn)?;
        Ok(Self {
            conn,
            generator: config.generator(),
            publisher: Arc::new(NoopPublisher),
        })
    }

    /// Replaces the change publisher (default: discard).
    pub fn with_publisher(mut self, publisher: Arc<dyn ChangePublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Creates an event, its rule, its materialized occurrences and its
    /// reminders as one unit.
    ///
    /// # Errors
    /// - `Validation` for an empty title, `end <= start` or an invalid rule;
    ///   nothing is written then.
    /// - `Storage` when any insert fails; nothing is visible afterwards.
    pub fn create_event(&self, owner_id: UserId, request: &CreateEventRequest) -> ServiceResult<Event> {
        let now = truncate_to_millis(Utc::now());
        let start = truncate_to_millis(request.start);
        let end = truncate_to_millis(request.end);
        validate_time_range(start, end)?;

        let mut event = Event::new(owner_id, request.title.clone(), start, end, request.time_zone);
        event.description.clone_from(&request.description);
        event.location.clone_from(&request.location);
        event.color.clone_from(&request.color);
        event.event_type = request.event_type;
        event.all_day = request.all_day;
        event.transparency = request.transparency;
        event.created_at = now;
        event.updated_at = now;
        event.validate()?;

        let rule = match &request.recurrence {
            Some(recurrence) => {
                let rule = recurrence.to_rule(event.id);
                validate_rule(&rule, now)?;
                Some(rule)
            }
            None => None,
        };
        let reminders: Vec<Reminder> = request
            .reminders
            .iter()
            .map(|reminder| Reminder::new(event.id, reminder.method, reminder.minutes_before, now))
            .collect();
        let instants = rule.as_ref().map_or_else(Vec::new, |rule| {
            self.generator.generate(event.start, event.time_zone, rule)
        });

        self.in_transaction("series_create", event.id, |tx| {
            let events = SqliteEventRepository::try_new(tx)?;
            let occurrences = SqliteOccurrenceRepository::try_new(tx)?;

            events.create_event(&event)?;
            if let Some(rule) = &rule {
                events.create_rule(rule)?;
                for instant in &instants {
                    let occurrence = EventOccurrence::upcoming(event.id, *instant, event.time_zone, now);
                    occurrences.create_occurrence(&occurrence)?;
                }
            }
            for reminder in &reminders {
                events.create_reminder(reminder)?;
            }
            Ok(())
        })?;

        info!(
            "event=series_materialize module=series status=ok event_id={} recurring={} occurrences={} reminders={}",
            event.id,
            rule.is_some(),
            instants.len(),
            reminders.len()
        );
        self.publish(SeriesChange::Created {
            event_id: event.id,
            owner_id,
            occurrences: instants.len(),
        });
        Ok(event)
    }

    /// Applies a partial update, rescheduling the series when the anchor
    /// moves and regenerating it when the rule is replaced.
    ///
    /// Shift mode (default) moves every occurrence and exception instant by
    /// `new_start - old_start`, together with the rule's `until`.
    /// Preserve-date-sequence mode keeps each row's calendar date in its own
    /// zone and takes only the new time of day.
    ///
    /// # Errors
    /// - `Validation` for an empty update, an invalid range or rule.
    /// - `EventNotFound` when `event_id` is unknown.
    /// - `Storage` when any write fails; the whole unit is rolled back.
    pub fn update_event(&self, event_id: EventId, request: &UpdateEventRequest) -> ServiceResult<Event> {
        if request.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        let now = truncate_to_millis(Utc::now());
        let current = self.load_event(event_id)?;

        let mut updated = current.clone();
        if let Some(title) = &request.title {
            updated.title.clone_from(title);
        }
        if request.description.is_some() {
            updated.description.clone_from(&request.description);
        }
        if request.location.is_some() {
            updated.location.clone_from(&request.location);
        }
        if request.color.is_some() {
            updated.color.clone_from(&request.color);
        }
        if let Some(event_type) = request.event_type {
            updated.event_type = event_type;
        }
        if let Some(time_zone) = request.time_zone {
            updated.time_zone = time_zone;
        }
        if let Some(all_day) = request.all_day {
            updated.all_day = all_day;
        }
        if let Some(transparency) = request.transparency {
            updated.transparency = transparency;
        }
        match (request.start.map(truncate_to_millis), request.end.map(truncate_to_millis)) {
            (Some(start), Some(end)) => {
                updated.start = start;
                updated.end = end;
            }
            (Some(start), None) => {
                updated.start = start;
                updated.end = start + current.duration();
            }
            (None, Some(end)) => updated.end = end,
            (None, None) => {}
        }
        updated.updated_at = now;
        updated.validate()?;

        let new_rule = match &request.recurrence {
            Some(recurrence) => {
                let rule = recurrence.to_rule(event_id);
                validate_rule(&rule, now)?;
                Some(rule)
            }
            None => None,
        };

        self.in_transaction("series_update", event_id, |tx| {
            let events = SqliteEventRepository::try_new(tx)?;
            let occurrences = SqliteOccurrenceRepository::try_new(tx)?;

            events.update_event(&updated)?;
            let start_moved = updated.start != current.start;
            let end_moved = updated.end != current.end;
            if request.preserve_date_sequence && (start_moved || end_moved) {
                let new_start = start_moved.then_some(updated.start);
                let new_end = end_moved.then_some(updated.end);
                preserve_date_sequence(&occurrences, event_id, new_start, new_end, now)?;
            } else if start_moved {
                let delta = updated.start - current.start;
                shift_series(&occurrences, event_id, delta, now)?;
                // `until` moves with the rows.
                if let Some(until) = events.get_rule_for_event(event_id)?.and_then(|rule| rule.until) {
                    events.set_rule_until(event_id, Some(until + delta))?;
                }
            }

            if let Some(rule) = &new_rule {
                events.delete_rule_for_event(event_id)?;
                events.create_rule(rule)?;
                self.regenerate(&occurrences, &updated, rule, now)?;
            }
            Ok(())
        })?;

        self.publish(SeriesChange::Updated {
            event_id,
            owner_id: updated.owner_id,
        });
        Ok(updated)
    }

    /// Deletes an event with its rule, exceptions, occurrences and reminders.
    ///
    /// # Errors
    /// - `EventNotFound` when `event_id` is unknown.
    pub fn delete_event(&self, event_id: EventId) -> ServiceResult<()> {
        let event = self.load_event(event_id)?;

        self.in_transaction("series_delete", event_id, |tx| {
            let events = SqliteEventRepository::try_new(tx)?;
            let occurrences = SqliteOccurrenceRepository::try_new(tx)?;

            events.delete_rule_for_event(event_id)?;
            occurrences.delete_exceptions_for_event(event_id)?;
            occurrences.delete_occurrences_for_event(event_id)?;
            events.delete_reminders_for_event(event_id)?;
            events.delete_event(event_id)?;
            Ok(())
        })?;

        self.publish(SeriesChange::Deleted {
            event_id,
            owner_id: event.owner_id,
        });
        Ok(())
    }

    /// Suppresses the occurrence generated at `original_start`.
    ///
    /// The occurrence row, if any, is kept; the instant disappears from every
    /// view through a `deleted` exception.
    ///
    /// # Errors
    /// - `EventNotFound`, `NotRecurring`, or `OccurrenceNotFound` when the
    ///   instant does not belong to the series.
    pub fn delete_occurrence(
        &self,
        event_id: EventId,
        original_start: DateTime<Utc>,
    ) -> ServiceResult<EventException> {
        let now = truncate_to_millis(Utc::now());
        let event = self.load_event(event_id)?;
        let target = self.locate_instant(&event, truncate_to_millis(original_start))?;

        let exception = self.in_transaction("occurrence_delete", event_id, |tx| {
            let occurrences = SqliteOccurrenceRepository::try_new(tx)?;
            match find_exception(&occurrences, event_id, &target)? {
                Some(mut exception) => {
                    exception.deleted = true;
                    if exception.occurrence_id.is_none() {
                        exception.occurrence_id = target.occurrence_id();
                    }
                    exception.updated_at = now;
                    occurrences.update_exception(&exception)?;
                    Ok(exception)
                }
                None => {
                    let exception = EventException::deletion(
                        event_id,
                        target.occurrence_id(),
                        target.original_start,
                        target.time_zone(&event),
                        now,
                    );
                    occurrences.create_exception(&exception)?;
                    Ok(exception)
                }
            }
        })?;

        self.publish(SeriesChange::OccurrenceChanged {
            event_id,
            owner_id: event.owner_id,
            original_start: exception.original_start,
            deleted: true,
        });
        Ok(exception)
    }

    /// Edits the occurrence addressed by its stored surrogate ID.
    ///
    /// # Errors
    /// - `OccurrenceNotFound` when no such row exists.
    /// - `NotRecurring` when its event lost its rule.
    pub fn update_occurrence_by_id(
        &self,
        occurrence_id: OccurrenceId,
        update: &OccurrenceUpdate,
    ) -> ServiceResult<OccurrenceEdit> {
        let occurrences = SqliteOccurrenceRepository::try_new(self.conn)?;
        let occurrence = occurrences
            .get_occurrence(occurrence_id)?
            .ok_or(ServiceError::OccurrenceNotFound(OccurrenceRef::Id(occurrence_id)))?;
        let event = self.load_event(occurrence.event_id)?;
        self.require_rule(&event)?;

        let target = OccurrenceTarget {
            original_start: occurrence.occurs_at,
            occurrence: Some(occurrence),
        };
        self.apply_occurrence_update(&event, target, update)
    }

    /// Edits the occurrence generated at `original_start`, materializing its
    /// row on demand when a status change is requested.
    pub fn update_occurrence(
        &self,
        event_id: EventId,
        original_start: DateTime<Utc>,
        update: &OccurrenceUpdate,
    ) -> ServiceResult<OccurrenceEdit> {
        let event = self.load_event(event_id)?;
        let target = self.locate_instant(&event, truncate_to_millis(original_start))?;
        self.apply_occurrence_update(&event, target, update)
    }

    fn apply_occurrence_update(
        &self,
        event: &Event,
        target: OccurrenceTarget,
        update: &OccurrenceUpdate,
    ) -> ServiceResult<OccurrenceEdit> {
        if update.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        let now = truncate_to_millis(Utc::now());
        let mut overrides = update.overrides.clone();
        overrides.start = overrides.start.map(truncate_to_millis);
        overrides.end = overrides.end.map(truncate_to_millis);
        if let Some(status) = update.status {
            let current = target
                .occurrence
                .as_ref()
                .map_or(OccurrenceStatus::Upcoming, |occurrence| occurrence.status);
            if !current.can_transition_to(status) {
                return Err(ValidationError::InvalidStatusTransition {
                    from: current,
                    to: status,
                }
                .into());
            }
        }

        let edit = self.in_transaction("occurrence_update", event.id, |tx| {
            let occurrences = SqliteOccurrenceRepository::try_new(tx)?;

            let mut occurrence = target.occurrence.clone();
            if let Some(status) = update.status {
                let mut row = match occurrence.take() {
                    Some(row) => row,
                    None => {
                        let row = EventOccurrence::upcoming(
                            event.id,
                            target.original_start,
                            event.time_zone,
                            now,
                        );
                        occurrences.create_occurrence(&row)?;
                        row
                    }
                };
                row.transition_to(status, now)?;
                occurrences.update_occurrence(&row)?;
                occurrence = Some(row);
            }

            let exception = if overrides.is_empty() {
                None
            } else {
                let occurrence_id = occurrence.as_ref().map(|row| row.id);
                let existing = find_exception(&occurrences, event.id, &target)?;
                let is_new = existing.is_none();
                let mut exception = existing.unwrap_or_else(|| {
                    EventException::with_overrides(
                        event.id,
                        occurrence_id,
                        target.original_start,
                        target.time_zone(event),
                        ExceptionOverrides::default(),
                        now,
                    )
                });
                exception.overrides.merge(&overrides);
                let effective_start = exception.overrides.start.unwrap_or(exception.original_start);
                let effective_end = exception
                    .overrides
                    .end
                    .unwrap_or(effective_start + event.duration());
                validate_time_range(effective_start, effective_end)?;
                if exception.occurrence_id.is_none() {
                    exception.occurrence_id = occurrence_id;
                }
                exception.updated_at = now;

                if is_new {
                    occurrences.create_exception(&exception)?;
                } else {
                    occurrences.update_exception(&exception)?;
                }
                Some(exception)
            };

            Ok(OccurrenceEdit {
                occurrence,
                exception,
            })
        })?;

        self.publish(SeriesChange::OccurrenceChanged {
            event_id: event.id,
            owner_id: event.owner_id,
            original_start: target.original_start,
            deleted: edit.exception.as_ref().is_some_and(|exception| exception.deleted),
        });
        Ok(edit)
    }

    /// Rewrites materialized rows to match `rule`: rows still produced keep
    /// their identity and status, rows no longer produced are removed after
    /// detaching exceptions, new instants are inserted as upcoming.
    fn regenerate(
        &self,
        occurrences: &SqliteOccurrenceRepository<'_>,
        event: &Event,
        rule: &RecurrenceRule,
        now: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let instants = self.generator.generate(event.start, event.time_zone, rule);
        let wanted: HashSet<DateTime<Utc>> = instants.iter().copied().collect();
        let existing = occurrences.list_occurrences(event.id)?;
        let kept: HashSet<DateTime<Utc>> = existing
            .iter()
            .map(|occurrence| occurrence.occurs_at)
            .filter(|instant| wanted.contains(instant))
            .collect();

        let mut removed = 0;
        for occurrence in existing.iter().filter(|row| !wanted.contains(&row.occurs_at)) {
            occurrences.detach_exceptions_from_occurrence(occurrence.id)?;
            occurrences.delete_occurrence(occurrence.id)?;
            removed += 1;
        }
        let mut added = 0;
        for instant in instants.iter().filter(|instant| !kept.contains(instant)) {
            let occurrence = EventOccurrence::upcoming(event.id, *instant, event.time_zone, now);
            occurrences.create_occurrence(&occurrence)?;
            added += 1;
        }

        info!(
            "event=series_regenerate module=series status=ok event_id={} kept={} removed={} added={}",
            event.id,
            kept.len(),
            removed,
            added
        );
        Ok(())
    }

    fn load_event(&self, event_id: EventId) -> ServiceResult<Event> {
        SqliteEventRepository::try_new(self.conn)?
            .get_event(event_id)?
            .ok_or(ServiceError::EventNotFound(event_id))
    }

    fn require_rule(&self, event: &Event) -> ServiceResult<RecurrenceRule> {
        SqliteEventRepository::try_new(self.conn)?
            .get_rule_for_event(event.id)?
            .ok_or(ServiceError::NotRecurring(event.id))
    }

    /// Resolves an instant of a recurring series: a stored row at that instant,
    /// or a generated instant not materialized yet.
    fn locate_instant(
        &self,
        event: &Event,
        original_start: DateTime<Utc>,
    ) -> ServiceResult<OccurrenceTarget> {
        let rule = self.require_rule(event)?;
        let occurrences = SqliteOccurrenceRepository::try_new(self.conn)?;
        if let Some(occurrence) = occurrences.get_occurrence_at(event.id, original_start)? {
            return Ok(OccurrenceTarget {
                original_start,
                occurrence: Some(occurrence),
            });
        }

        let generated = self.generator.generate(event.start, event.time_zone, &rule);
        if generated.binary_search(&original_start).is_ok() {
            return Ok(OccurrenceTarget {
                original_start,
                occurrence: None,
            });
        }
        Err(ServiceError::OccurrenceNotFound(OccurrenceRef::Instant {
            event_id: event.id,
            original_start,
        }))
    }

    fn in_transaction<T>(
        &self,
        op: &'static str,
        event_id: EventId,
        work: impl FnOnce(&Transaction<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let started_at = Instant::now();
        let result = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(ServiceError::from)
            .and_then(|tx| {
                let value = work(&tx)?;
                tx.commit()?;
                Ok(value)
            });

        match &result {
            Ok(_) => info!(
                "event={op} module=series status=ok event_id={event_id} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={op} module=series status=error event_id={event_id} duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    fn publish(&self, change: SeriesChange) {
        if let Err(err) = self.publisher.publish(&change) {
            warn!(
                "event=change_publish module=series status=error change={} event_id={} error={}",
                change.kind(),
                change.event_id(),
                err
            );
        }
    }
}

/// Looks up the exception of one slot: by occurrence back-reference first,
/// then by original instant.
fn find_exception(
    occurrences: &SqliteOccurrenceRepository<'_>,
    event_id: EventId,
    target: &OccurrenceTarget,
) -> ServiceResult<Option<EventException>> {
    if let Some(occurrence_id) = target.occurrence_id() {
        let linked = occurrences.list_exceptions_by_occurrence(occurrence_id)?;
        if let Some(exception) = linked.into_iter().next() {
            return Ok(Some(exception));
        }
    }
    Ok(occurrences.get_exception_by_original(event_id, target.original_start)?)
}

/// Moves every occurrence and exception instant of the series by `delta`.
///
/// Rows are visited latest-first for a positive delta and earliest-first
/// otherwise, so no intermediate state collides with the unique instant keys.
fn shift_series(
    occurrences: &SqliteOccurrenceRepository<'_>,
    event_id: EventId,
    delta: TimeDelta,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let mut rows = occurrences.list_occurrences(event_id)?;
    let mut exceptions = occurrences.list_exceptions(event_id)?;
    if delta > TimeDelta::zero() {
        rows.reverse();
        exceptions.reverse();
    }

    for mut row in rows {
        row.occurs_at += delta;
        row.updated_at = now;
        occurrences.update_occurrence(&row)?;
    }
    let shifted_exceptions = exceptions.len();
    for mut exception in exceptions {
        exception.original_start += delta;
        exception.overrides.shift(delta);
        exception.updated_at = now;
        occurrences.update_exception(&exception)?;
    }

    info!(
        "event=series_shift module=series status=ok event_id={} delta_ms={} exceptions={}",
        event_id,
        delta.num_milliseconds(),
        shifted_exceptions
    );
    Ok(())
}

/// Keeps each row's calendar date (in the row's own zone) and replaces its
/// time of day with that of `new_start` / `new_end`.
fn preserve_date_sequence(
    occurrences: &SqliteOccurrenceRepository<'_>,
    event_id: EventId,
    new_start: Option<DateTime<Utc>>,
    new_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    if let Some(reference) = new_start {
        for mut row in occurrences.list_occurrences(event_id)? {
            row.occurs_at = with_time_of(row.occurs_at, row.time_zone, reference);
            row.updated_at = now;
            occurrences.update_occurrence(&row)?;
        }
    }

    for mut exception in occurrences.list_exceptions(event_id)? {
        let tz = exception.time_zone;
        if let Some(reference) = new_start {
            exception.original_start = with_time_of(exception.original_start, tz, reference);
            exception.overrides.start = exception
                .overrides
                .start
                .map(|start| with_time_of(start, tz, reference));
        }
        if let Some(reference) = new_end {
            exception.overrides.end = exception
                .overrides
                .end
                .map(|end| with_time_of(end, tz, reference));
        }
        exception.updated_at = now;
        occurrences.update_exception(&exception)?;
    }

    info!(
        "event=series_preserve_dates module=series status=ok event_id={} start_changed={} end_changed={}",
        event_id,
        new_start.is_some(),
        new_end.is_some()
    );
    Ok(())
}
