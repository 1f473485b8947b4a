//! Recurrence rule domain model.
//!
//! # Responsibility
//! - Define the rule that turns one anchor event into a series.
//! - Own text encodings of frequency and filter sets.
//!
//! # Invariants
//! - A rule belongs to exactly one event; an event has at most one rule.
//! - `interval >= 1`; `count`, when set, is `>= 1`.
//! - Filters only apply to the frequency they belong to (weekday for
//!   weekly/biweekly, day-of-month for monthly, month for yearly); the
//!   custom frequency honors all of them.

use crate::model::event::EventId;
use crate::model::validation::ValidationError;
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a recurrence rule.
pub type RuleId = Uuid;

/// Series repetition unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    /// Every other week regardless of `interval`.
    Biweekly,
    Monthly,
    Yearly,
    /// Day stepping filtered by every configured filter.
    Custom,
}

impl Frequency {
    /// Storage/wire text for this frequency.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            _ => Err(ValidationError::UnknownValue {
                field: "recurrence frequency",
                value: value.to_string(),
            }),
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence rule attached to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: RuleId,
    pub event_id: EventId,
    pub frequency: Frequency,
    /// "Every N units". Must be at least 1.
    pub interval: u32,
    /// Weekday filter (weekly/biweekly/custom).
    pub by_weekday: Vec<Weekday>,
    /// Month filter, `1..=12` (yearly/custom).
    pub by_month: Vec<u32>,
    /// Calendar day-of-month filter, `1..=31` (monthly/custom).
    pub by_month_day: Vec<u32>,
    /// Maximum number of generated occurrences.
    pub count: Option<u32>,
    /// Exclusive end instant of the series.
    pub until: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    /// Creates an unbounded `interval = 1` rule without filters.
    pub fn new(event_id: EventId, frequency: Frequency) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            frequency,
            interval: 1,
            by_weekday: Vec::new(),
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            count: None,
            until: None,
        }
    }

    /// Returns whether neither `count` nor `until` bounds the series.
    pub fn is_open_ended(&self) -> bool {
        self.count.is_none() && self.until.is_none()
    }
}

/// Two-letter weekday code (`MO`..`SU`).
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Parses a two-letter weekday code, case-insensitively.
pub fn parse_weekday_code(value: &str) -> Result<Weekday, ValidationError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(ValidationError::UnknownValue {
            field: "weekday",
            value: value.to_string(),
        }),
    }
}

/// Encodes a weekday set as `MO,WE,FR` (Monday-first order, deduplicated).
pub fn format_weekdays(days: &[Weekday]) -> String {
    let mut sorted = days.to_vec();
    sorted.sort_by_key(|day| day.num_days_from_monday());
    sorted.dedup();
    sorted
        .into_iter()
        .map(weekday_code)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes a comma separated weekday set. Empty input yields an empty set.
pub fn parse_weekdays(value: &str) -> Result<Vec<Weekday>, ValidationError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_weekday_code)
        .collect()
}

/// Encodes a numeric filter set as `1,15,31` (ascending, deduplicated).
pub fn format_numbers(values: &[u32]) -> String {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes a comma separated numeric filter set.
pub fn parse_numbers(value: &str, field: &'static str) -> Result<Vec<u32>, ValidationError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>().map_err(|_| ValidationError::UnknownValue {
                field,
                value: part.to_string(),
            })
        })
        .collect()
}
