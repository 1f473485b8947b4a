//! Sparse per-occurrence override model.
//!
//! # Responsibility
//! - Describe a suppression or field override of exactly one occurrence.
//!
//! # Invariants
//! - Keyed by `(event_id, original_start)`: at most one exception per
//!   original instant. A second edit merges into the existing row.
//! - `deleted = true` hides the instant from every view without removing the
//!   occurrence row.
//! - `occurrence_id` is a convenience back-reference only; the instant is the
//!   key.

use crate::model::event::{EventId, Transparency};
use crate::model::occurrence::OccurrenceId;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an exception row.
pub type ExceptionId = Uuid;

/// All-optional overrides for one occurrence. `None` means "use the series value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionOverrides {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub transparency: Option<Transparency>,
}

impl ExceptionOverrides {
    /// Returns whether no field is overridden.
    pub fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.color.is_none()
            && self.transparency.is_none()
    }

    /// Merges `newer` into `self`; fields set in `newer` win.
    pub fn merge(&mut self, newer: &ExceptionOverrides) {
        if newer.start.is_some() {
            self.start = newer.start;
        }
        if newer.end.is_some() {
            self.end = newer.end;
        }
        if newer.title.is_some() {
            self.title.clone_from(&newer.title);
        }
        if newer.description.is_some() {
            self.description.clone_from(&newer.description);
        }
        if newer.location.is_some() {
            self.location.clone_from(&newer.location);
        }
        if newer.color.is_some() {
            self.color.clone_from(&newer.color);
        }
        if newer.transparency.is_some() {
            self.transparency = newer.transparency;
        }
    }

    /// Translates the override start/end by `delta`. Other fields are untouched.
    pub fn shift(&mut self, delta: TimeDelta) {
        self.start = self.start.map(|start| start + delta);
        self.end = self.end.map(|end| end + delta);
    }
}

/// Persisted override or suppression of one occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventException {
    pub id: ExceptionId,
    pub event_id: EventId,
    pub occurrence_id: Option<OccurrenceId>,
    /// Instant the overridden occurrence was generated at (the key).
    pub original_start: DateTime<Utc>,
    /// Zone context the row was created with.
    pub time_zone: Tz,
    pub deleted: bool,
    pub overrides: ExceptionOverrides,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventException {
    /// Creates an exception carrying `overrides` for one original instant.
    pub fn with_overrides(
        event_id: EventId,
        occurrence_id: Option<OccurrenceId>,
        original_start: DateTime<Utc>,
        time_zone: Tz,
        overrides: ExceptionOverrides,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            occurrence_id,
            original_start,
            time_zone,
            deleted: false,
            overrides,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a suppression (`deleted = true`) for one original instant.
    pub fn deletion(
        event_id: EventId,
        occurrence_id: Option<OccurrenceId>,
        original_start: DateTime<Utc>,
        time_zone: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        let mut exception = Self::with_overrides(
            event_id,
            occurrence_id,
            original_start,
            time_zone,
            ExceptionOverrides::default(),
            now,
        );
        exception.deleted = true;
        exception
    }
}

#[cfg(test)]
mod tests {
    use super::ExceptionOverrides;
    use crate::model::event::Transparency;
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test]
    fn merge_keeps_older_fields_not_set_by_newer() {
        let mut current = ExceptionOverrides {
            title: Some("Moved standup".to_string()),
            color: Some("#ff0000".to_string()),
            ..ExceptionOverrides::default()
        };
        current.merge(&ExceptionOverrides {
            title: Some("Cancelled standup".to_string()),
            transparency: Some(Transparency::Transparent),
            ..ExceptionOverrides::default()
        });

        assert_eq!(current.title.as_deref(), Some("Cancelled standup"));
        assert_eq!(current.color.as_deref(), Some("#ff0000"));
        assert_eq!(current.transparency, Some(Transparency::Transparent));
    }

    #[test]
    fn shift_moves_only_time_fields() {
        let start = Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap();
        let mut overrides = ExceptionOverrides {
            start: Some(start),
            title: Some("kept".to_string()),
            ..ExceptionOverrides::default()
        };
        overrides.shift(TimeDelta::days(2));
        assert_eq!(overrides.start, Some(start + TimeDelta::days(2)));
        assert_eq!(overrides.end, None);
        assert_eq!(overrides.title.as_deref(), Some("kept"));
    }
}
