//! Event (series anchor) domain model.
//!
//! # Responsibility
//! - Define the canonical event record that anchors a recurring series.
//! - Provide enum text mappings shared by storage and callers.
//!
//! # Invariants
//! - `id` is stable and never reused for another event.
//! - `end` is strictly after `start`.
//! - `start`/`end` are UTC instants; `time_zone` is the zone all calendar
//!   arithmetic for this event runs in.

use crate::model::validation::ValidationError;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of an event.
pub type EventId = Uuid;

/// Identifier of the owning user. Authentication lives outside the core.
pub type UserId = Uuid;

/// Caller-facing event category, used by list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Meeting,
    Appointment,
    Task,
    Reminder,
    Other,
}

impl EventType {
    /// Storage/wire text for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::Appointment => "appointment",
            Self::Task => "task",
            Self::Reminder => "reminder",
            Self::Other => "other",
        }
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "meeting" => Ok(Self::Meeting),
            "appointment" => Ok(Self::Appointment),
            "task" => Ok(Self::Task),
            "reminder" => Ok(Self::Reminder),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::UnknownValue {
                field: "event type",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free/busy transparency of an event or a single occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    /// Blocks time (busy).
    #[default]
    Opaque,
    /// Does not block time (free).
    Transparent,
}

impl Transparency {
    /// Storage/wire text for this value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Transparent => "transparent",
        }
    }
}

impl FromStr for Transparency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "opaque" => Ok(Self::Opaque),
            "transparent" => Ok(Self::Transparent),
            _ => Err(ValidationError::UnknownValue {
                field: "transparency",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for Transparency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical event record.
///
/// A recurring event carries exactly one rule in storage; this record does
/// not embed it so single events and series share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub owner_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Free-form display color, e.g. `#1e88e5`.
    pub color: Option<String>,
    pub event_type: EventType,
    /// Series anchor instant (UTC).
    pub start: DateTime<Utc>,
    /// End of the anchor instance (UTC). Defines the series duration.
    pub end: DateTime<Utc>,
    /// Original zone of the event; generation and rescheduling run here.
    pub time_zone: Tz,
    pub all_day: bool,
    pub transparency: Transparency,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new event with a generated stable ID and default fields.
    pub fn new(
        owner_id: UserId,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        time_zone: Tz,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
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
            created_at: now,
            updated_at: now,
        }
    }

    /// Length of one instance of this event.
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Validates record-level invariants.
    ///
    /// # Errors
    /// - `EmptyTitle` when the title is blank.
    /// - `InvalidTimeRange` when `end <= start`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        validate_time_range(self.start, self.end)
    }
}

/// Rejects ranges whose end is not strictly after the start.
pub fn validate_time_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::InvalidTimeRange { start, end });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Event, EventType, Transparency};
    use crate::model::validation::ValidationError;
    use chrono::{TimeDelta, TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn event_type_parses_case_insensitively_and_rejects_unknown() {
        assert_eq!("Meeting".parse::<EventType>().unwrap(), EventType::Meeting);
        let err = "party".parse::<EventType>().unwrap_err();
        assert!(matches!(err, ValidationError::UnknownValue { field: "event type", .. }));
    }

    #[test]
    fn transparency_round_trips_through_text() {
        for value in [Transparency::Opaque, Transparency::Transparent] {
            assert_eq!(value.as_str().parse::<Transparency>().unwrap(), value);
        }
    }

    #[test]
    fn validate_rejects_empty_title_and_inverted_range() {
        let start = Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap();
        let mut event = Event::new(
            Uuid::new_v4(),
            "  ",
            start,
            start + TimeDelta::hours(1),
            chrono_tz::UTC,
        );
        assert_eq!(event.validate(), Err(ValidationError::EmptyTitle));

        event.title = "standup".to_string();
        event.end = start;
        assert!(matches!(
            event.validate(),
            Err(ValidationError::InvalidTimeRange { .. })
        ));
    }
}
