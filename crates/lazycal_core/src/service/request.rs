//! Write request models accepted by the series service.

use crate::model::event::{EventId, EventType, Transparency};
use crate::model::exception::ExceptionOverrides;
use crate::model::occurrence::OccurrenceStatus;
use crate::model::recurrence::{Frequency, RecurrenceRule};
use crate::model::reminder::NotificationMethod;
use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request model for creating an event, optionally recurring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub event_type: EventType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Zone generation and rescheduling run in.
    pub time_zone: Tz,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub transparency: Transparency,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRequest>,
    #[serde(default)]
    pub reminders: Vec<ReminderRequest>,
}

impl CreateEventRequest {
    /// Minimal single-event request with default fields.
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        time_zone: Tz,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            location: None,
            color: None,
            event_type: EventType::Meeting,
            start,
            end,
            time_zone,
            all_day: false,
            transparency: Transparency::Opaque,
            recurrence: None,
            reminders: Vec::new(),
        }
    }
}

/// Recurrence block of a create/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRequest {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub by_weekday: Vec<Weekday>,
    #[serde(default)]
    pub by_month: Vec<u32>,
    #[serde(default)]
    pub by_month_day: Vec<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRequest {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: default_interval(),
            by_weekday: Vec::new(),
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            count: None,
            until: None,
        }
    }

    /// Builds the rule this request describes for `event_id`.
    pub fn to_rule(&self, event_id: EventId) -> RecurrenceRule {
        RecurrenceRule {
            id: Uuid::new_v4(),
            event_id,
            frequency: self.frequency,
            interval: self.interval,
            by_weekday: self.by_weekday.clone(),
            by_month: self.by_month.clone(),
            by_month_day: self.by_month_day.clone(),
            count: self.count,
            until: self.until,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub method: NotificationMethod,
    pub minutes_before: u32,
}

/// Partial update of an event. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub event_type: Option<EventType>,
    /// New series anchor. Without `end`, the old duration is kept.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub time_zone: Option<Tz>,
    pub all_day: Option<bool>,
    pub transparency: Option<Transparency>,
    /// Replaces the rule and regenerates materialized occurrences.
    pub recurrence: Option<RecurrenceRequest>,
    /// Keep each occurrence's calendar date and change only its time of day,
    /// instead of shifting every instant by the anchor delta.
    pub preserve_date_sequence: bool,
}

impl UpdateEventRequest {
    /// Returns whether the request changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.color.is_none()
            && self.event_type.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.time_zone.is_none()
            && self.all_day.is_none()
            && self.transparency.is_none()
            && self.recurrence.is_none()
    }
}

/// Partial update of one occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccurrenceUpdate {
    /// Field overrides merged into the occurrence's exception.
    pub overrides: ExceptionOverrides,
    /// Status change of the materialized occurrence row.
    pub status: Option<OccurrenceStatus>,
}

impl OccurrenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.status.is_none()
    }
}
