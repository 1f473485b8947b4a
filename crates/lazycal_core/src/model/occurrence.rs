//! Materialized occurrence model.
//!
//! # Invariants
//! - One row per persisted generated instant of a series.
//! - Status only moves `Upcoming -> Completed | Cancelled`.

use crate::model::event::EventId;
use crate::model::validation::ValidationError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable surrogate ID of one materialized occurrence.
pub type OccurrenceId = Uuid;

/// Lifecycle state of one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    #[default]
    Upcoming,
    Completed,
    Cancelled,
}

impl OccurrenceStatus {
    /// Storage/wire text for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether `self -> next` is allowed. Re-applying the current
    /// status is a no-op and allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next
            || matches!(
                (self, next),
                (Self::Upcoming, Self::Completed) | (Self::Upcoming, Self::Cancelled)
            )
    }
}

impl FromStr for OccurrenceStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(Self::Upcoming),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ValidationError::UnknownValue {
                field: "occurrence status",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for OccurrenceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted instance of a series, the attachment point for status tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub id: OccurrenceId,
    pub event_id: EventId,
    /// Current instant of this occurrence (UTC).
    pub occurs_at: DateTime<Utc>,
    /// Zone context the row was created with.
    pub time_zone: Tz,
    pub status: OccurrenceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventOccurrence {
    /// Creates a new `Upcoming` occurrence row.
    pub fn upcoming(
        event_id: EventId,
        occurs_at: DateTime<Utc>,
        time_zone: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            occurs_at,
            time_zone,
            status: OccurrenceStatus::Upcoming,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves this occurrence to `next`, enforcing the status lifecycle.
    ///
    /// # Errors
    /// - `InvalidStatusTransition` for anything but `upcoming -> completed|cancelled`.
    pub fn transition_to(
        &mut self,
        next: OccurrenceStatus,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
