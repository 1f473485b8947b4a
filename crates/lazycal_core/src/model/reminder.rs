//! Reminder records attached to events.
//!
//! Delivery is owned by an external dispatcher; the core only persists them.

use crate::model::event::EventId;
use crate::model::validation::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a reminder.
pub type ReminderId = Uuid;

/// Channel the external dispatcher uses for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMethod {
    Email,
    Push,
    InApp,
}

impl NotificationMethod {
    /// Storage/wire text for this method.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::InApp => "in_app",
        }
    }
}

impl FromStr for NotificationMethod {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            "in_app" => Ok(Self::InApp),
            _ => Err(ValidationError::UnknownValue {
                field: "notification method",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for NotificationMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted reminder: notify `minutes_before` the start of each instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub event_id: EventId,
    pub method: NotificationMethod,
    pub minutes_before: u32,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(
        event_id: EventId,
        method: NotificationMethod,
        minutes_before: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            method,
            minutes_before,
            created_at: now,
        }
    }
}
