//! Validation errors shared by domain records and write requests.
//!
//! # Invariants
//! - Every variant describes a rejection that happens before any storage
//!   write is attempted.

use crate::model::occurrence::OccurrenceStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Input rejected by domain validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Event title is empty after trimming.
    #[error("event title cannot be empty")]
    EmptyTitle,
    /// End instant is not strictly after start instant.
    #[error("invalid time range: end {end} must be after start {start}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Enum-like text field holds an unsupported value.
    #[error("unknown {field} value `{value}`")]
    UnknownValue { field: &'static str, value: String },
    /// Time zone name is not a known IANA identifier.
    #[error("unknown time zone `{0}`")]
    InvalidTimeZone(String),
    /// Recurrence interval below 1.
    #[error("recurrence interval must be >= 1, got {0}")]
    InvalidInterval(u32),
    /// Recurrence count below 1.
    #[error("recurrence count must be >= 1, got {0}")]
    InvalidCount(u32),
    /// Recurrence `until` is not after the rule creation time.
    #[error("recurrence until {until} must be after {now}")]
    UntilNotInFuture {
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// Month filter value outside `1..=12`.
    #[error("month filter value must be within 1..=12, got {0}")]
    InvalidMonth(u32),
    /// Day-of-month filter value outside `1..=31`.
    #[error("day-of-month filter value must be within 1..=31, got {0}")]
    InvalidMonthDay(u32),
    /// Occurrence status change outside `upcoming -> completed|cancelled`.
    #[error("occurrence status cannot change from {from} to {to}")]
    InvalidStatusTransition {
        from: OccurrenceStatus,
        to: OccurrenceStatus,
    },
    /// Update request carries no field to change.
    #[error("update request does not change anything")]
    EmptyUpdate,
    /// Page number below 1.
    #[error("page must be >= 1, got {0}")]
    InvalidPage(u32),
}
