//! Read-side use-cases: range listing and single-event views.
//!
//! # Responsibility
//! - Expand recurring candidates into the occurrence list a caller sees,
//!   combining generation, stored occurrence rows and exceptions.
//!
//! # Invariants
//! - Generation always runs over the full series; range filtering happens
//!   on effective (post-override) starts afterwards.
//! - Stored rows and exceptions are loaded across the whole series lifetime,
//!   so overrides that move an instant into or out of the range are honored.
//! - Search applies to events in SQL. A recurring candidate with no
//!   occurrence left in the range is dropped before paging, so `total`
//!   counts exactly the events a caller can page through.

use crate::config::EngineConfig;
use crate::error::{OccurrenceRef, ServiceError, ServiceResult};
use crate::model::event::{validate_time_range, Event, EventId, EventType, UserId};
use crate::model::occurrence::{EventOccurrence, OccurrenceId};
use crate::model::recurrence::RecurrenceRule;
use crate::model::reminder::Reminder;
use crate::model::validation::ValidationError;
use crate::recurrence::{apply_exceptions, OccurrenceGenerator, OccurrenceResponse};
use crate::repo::event_repo::{EventListFilter, EventRepository, SqliteEventRepository};
use crate::repo::occurrence_repo::{OccurrenceRepository, SqliteOccurrenceRepository};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

/// Owner-scoped range query.
#[derive(Debug, Clone)]
pub struct EventListQuery {
    pub owner_id: UserId,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub event_type: Option<EventType>,
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u32,
    /// `None` uses the configured default; values above the maximum clamp.
    pub page_size: Option<u32>,
}

impl EventListQuery {
    /// First page of every event of `owner_id` within the range.
    pub fn new(owner_id: UserId, range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            range_start,
            range_end,
            event_type: None,
            search: None,
            page: 1,
            page_size: None,
        }
    }
}

/// Event with its rule, reminders and rendered occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventView {
    pub event: Event,
    pub rule: Option<RecurrenceRule>,
    pub reminders: Vec<Reminder>,
    /// Empty for non-recurring events.
    pub occurrences: Vec<OccurrenceResponse>,
}

/// One page of a range listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListResult {
    pub events: Vec<EventView>,
    /// Number of matching events across all pages.
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Read-side service over any repository implementations.
pub struct EventQueryService<E: EventRepository, O: OccurrenceRepository> {
    events: E,
    occurrences: O,
    generator: OccurrenceGenerator,
    config: EngineConfig,
}

impl<'conn> EventQueryService<SqliteEventRepository<'conn>, SqliteOccurrenceRepository<'conn>> {
    /// Creates a query service reading from a migrated SQLite connection.
    pub fn try_new_sqlite(conn: &'conn Connection, config: &EngineConfig) -> ServiceResult<Self> {
        Ok(Self::new(
            SqliteEventRepository::try_new(conn)?,
            SqliteOccurrenceRepository::try_new(conn)?,
            config,
        ))
    }
}

impl<E: EventRepository, O: OccurrenceRepository> EventQueryService<E, O> {
    pub fn new(events: E, occurrences: O, config: &EngineConfig) -> Self {
        Self {
            events,
            occurrences,
            generator: config.generator(),
            config: config.clone(),
        }
    }

    /// Lists one page of events overlapping the query range, each recurring
    /// event carrying its rendered occurrences within the range.
    ///
    /// A recurring event is listed only when at least one rendered
    /// occurrence starts within the range.
    ///
    /// # Errors
    /// - `Validation` when `range_end <= range_start` or `page == 0`.
    pub fn list_events(&self, query: &EventListQuery) -> ServiceResult<EventListResult> {
        validate_time_range(query.range_start, query.range_end)?;
        if query.page == 0 {
            return Err(ValidationError::InvalidPage(query.page).into());
        }
        let started_at = Instant::now();
        let page_size = self.config.page_size(query.page_size);
        let offset = (query.page - 1).saturating_mul(page_size);

        let filter = EventListFilter {
            owner_id: query.owner_id,
            range_start: query.range_start,
            range_end: query.range_end,
            event_type: query.event_type,
            search: query.search.clone(),
            limit: None,
            offset: 0,
        };

        let mut visible = Vec::new();
        for event in self.events.list_events(&filter)? {
            let rule = self.events.get_rule_for_event(event.id)?;
            let occurrences = match &rule {
                Some(rule) => {
                    let mut rendered = self.render(&event, rule)?;
                    rendered.retain(|occurrence| {
                        occurrence.start >= query.range_start && occurrence.start <= query.range_end
                    });
                    if rendered.is_empty() {
                        continue;
                    }
                    rendered
                }
                None => Vec::new(),
            };
            visible.push((event, rule, occurrences));
        }
        let total = u64::try_from(visible.len()).unwrap_or(u64::MAX);

        let mut views = Vec::new();
        for (event, rule, occurrences) in visible
            .into_iter()
            .skip(offset as usize)
            .take(page_size as usize)
        {
            let reminders = self.events.list_reminders(event.id)?;
            views.push(EventView {
                event,
                rule,
                reminders,
                occurrences,
            });
        }

        debug!(
            "event=events_list module=query status=ok total={} page={} page_size={} returned={} duration_ms={}",
            total,
            query.page,
            page_size,
            views.len(),
            started_at.elapsed().as_millis()
        );
        Ok(EventListResult {
            events: views,
            total,
            page: query.page,
            page_size,
        })
    }

    /// Returns one event with every rendered occurrence of its series.
    ///
    /// # Errors
    /// - `EventNotFound` when `event_id` is unknown.
    pub fn get_event(&self, event_id: EventId) -> ServiceResult<EventView> {
        let event = self
            .events
            .get_event(event_id)?
            .ok_or(ServiceError::EventNotFound(event_id))?;
        self.expand(event)
    }

    /// Returns one materialized occurrence row.
    pub fn get_occurrence(&self, occurrence_id: OccurrenceId) -> ServiceResult<EventOccurrence> {
        self.occurrences
            .get_occurrence(occurrence_id)?
            .ok_or(ServiceError::OccurrenceNotFound(OccurrenceRef::Id(occurrence_id)))
    }

    fn expand(&self, event: Event) -> ServiceResult<EventView> {
        let rule = self.events.get_rule_for_event(event.id)?;
        let reminders = self.events.list_reminders(event.id)?;
        let occurrences = match &rule {
            Some(rule) => self.render(&event, rule)?,
            None => Vec::new(),
        };
        Ok(EventView {
            event,
            rule,
            reminders,
            occurrences,
        })
    }

    fn render(&self, event: &Event, rule: &RecurrenceRule) -> ServiceResult<Vec<OccurrenceResponse>> {
        let generated = self.generator.generate(event.start, event.time_zone, rule);
        let (Some(first), Some(last)) = (generated.first(), generated.last()) else {
            return Ok(Vec::new());
        };
        let stored = self
            .occurrences
            .list_occurrences_in_range(event.id, *first, *last)?;
        let exceptions = self
            .occurrences
            .list_exceptions_in_range(event.id, *first, *last)?;
        Ok(apply_exceptions(event, &generated, &stored, &exceptions))
    }
}
