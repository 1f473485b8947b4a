//! Time-zone arithmetic shared by generation and rescheduling.
//!
//! # Invariants
//! - Calendar math runs on naive local times of one zone; results are
//!   normalized to UTC only at the end.
//! - Ambiguous local times (DST fall-back) resolve to the earliest instant.
//! - Non-existent local times (DST spring-forward gap) move one hour forward.

use crate::model::validation::ValidationError;
use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Parses an IANA zone name such as `Europe/Berlin`.
pub fn parse_time_zone(name: &str) -> Result<Tz, ValidationError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimeZone(name.to_string()))
}

/// Wall-clock time of `instant` in `tz`.
pub fn local_naive(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// Resolves a wall-clock time in `tz` to a UTC instant, leniently.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    if let Some(resolved) = tz.from_local_datetime(&local).earliest() {
        return resolved.with_timezone(&Utc);
    }
    let shifted = local + TimeDelta::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(resolved) => resolved.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&local),
    }
}

/// Keeps the calendar date of `instant` in `row_tz` and takes the time of day
/// from `reference`, also read in `row_tz`.
pub fn with_time_of(instant: DateTime<Utc>, row_tz: Tz, reference: DateTime<Utc>) -> DateTime<Utc> {
    let date = local_naive(instant, row_tz).date();
    let time = local_naive(reference, row_tz).time();
    resolve_local(row_tz, date.and_time(time))
}

/// Drops sub-millisecond precision so instants survive storage unchanged.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

pub fn to_epoch_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
