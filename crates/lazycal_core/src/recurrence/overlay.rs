//! Exception overlay over generated instants.
//!
//! # Responsibility
//! - Turn generated instants plus stored occurrence rows and exceptions into
//!   the caller-facing occurrence list.
//!
//! # Invariants
//! - Stored rows and exceptions are matched by exact instant, never by
//!   position in the sequence.
//! - An instant with a deleted exception never appears in the output.
//! - Output is ordered by effective (post-override) start; ties keep
//!   generation order.

use crate::model::event::{Event, EventId, Transparency};
use crate::model::exception::{EventException, ExceptionId};
use crate::model::occurrence::{EventOccurrence, OccurrenceId, OccurrenceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read model of one rendered occurrence. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceResponse {
    /// Stored occurrence row, if this instant has been materialized.
    pub occurrence_id: Option<OccurrenceId>,
    pub event_id: EventId,
    /// Generated instant; the key of any exception for this occurrence.
    pub original_start: DateTime<Utc>,
    /// Effective start after overrides.
    pub start: DateTime<Utc>,
    /// Effective end after overrides.
    pub end: DateTime<Utc>,
    pub status: OccurrenceStatus,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub transparency: Transparency,
    pub all_day: bool,
    pub exception_id: Option<ExceptionId>,
    /// Whether an exception overrides any field of this occurrence.
    pub modified: bool,
}

/// Overlays `exceptions` and stored `occurrences` onto `generated` instants.
pub fn apply_exceptions(
    event: &Event,
    generated: &[DateTime<Utc>],
    occurrences: &[EventOccurrence],
    exceptions: &[EventException],
) -> Vec<OccurrenceResponse> {
    let stored: HashMap<DateTime<Utc>, &EventOccurrence> = occurrences
        .iter()
        .map(|occurrence| (occurrence.occurs_at, occurrence))
        .collect();
    let overrides: HashMap<DateTime<Utc>, &EventException> = exceptions
        .iter()
        .map(|exception| (exception.original_start, exception))
        .collect();
    let duration = event.duration();

    let mut responses = Vec::with_capacity(generated.len());
    for original_start in generated {
        let exception = overrides.get(original_start).copied();
        if exception.is_some_and(|exception| exception.deleted) {
            continue;
        }
        let occurrence = stored.get(original_start).copied();

        let mut response = OccurrenceResponse {
            occurrence_id: occurrence.map(|occurrence| occurrence.id),
            event_id: event.id,
            original_start: *original_start,
            start: *original_start,
            end: *original_start + duration,
            status: occurrence.map_or(OccurrenceStatus::Upcoming, |occurrence| occurrence.status),
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            color: event.color.clone(),
            transparency: event.transparency,
            all_day: event.all_day,
            exception_id: None,
            modified: false,
        };

        if let Some(exception) = exception {
            let fields = &exception.overrides;
            response.exception_id = Some(exception.id);
            response.modified = !fields.is_empty();
            if let Some(start) = fields.start {
                response.start = start;
                response.end = start + duration;
            }
            if let Some(end) = fields.end {
                response.end = end;
            }
            if let Some(title) = &fields.title {
                response.title.clone_from(title);
            }
            if fields.description.is_some() {
                response.description.clone_from(&fields.description);
            }
            if fields.location.is_some() {
                response.location.clone_from(&fields.location);
            }
            if fields.color.is_some() {
                response.color.clone_from(&fields.color);
            }
            if let Some(transparency) = fields.transparency {
                response.transparency = transparency;
            }
        }

        responses.push(response);
    }

    responses.sort_by_key(|response| response.start);
    responses
}

#[cfg(test)]
mod tests {
    use super::apply_exceptions;
    use crate::model::event::{Event, Transparency};
    use crate::model::exception::{EventException, ExceptionOverrides};
    use crate::model::occurrence::{EventOccurrence, OccurrenceStatus};
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use uuid::Uuid;

    fn series() -> (Event, Vec<DateTime<Utc>>) {
        let start = Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap();
        let mut event = Event::new(
            Uuid::new_v4(),
            "Standup",
            start,
            start + TimeDelta::minutes(30),
            chrono_tz::UTC,
        );
        event.location = Some("Room 1".to_string());
        let generated = (0..4).map(|day| start + TimeDelta::days(day)).collect();
        (event, generated)
    }

    #[test]
    fn no_exceptions_yields_event_defaults() {
        let (event, generated) = series();
        let responses = apply_exceptions(&event, &generated, &[], &[]);

        assert_eq!(responses.len(), 4);
        for (response, instant) in responses.iter().zip(&generated) {
            assert_eq!(response.start, *instant);
            assert_eq!(response.end, *instant + TimeDelta::minutes(30));
            assert_eq!(response.title, "Standup");
            assert_eq!(response.status, OccurrenceStatus::Upcoming);
            assert!(response.occurrence_id.is_none());
            assert!(!response.modified);
        }
    }

    #[test]
    fn deleted_exception_drops_the_instant() {
        let (event, generated) = series();
        let exception = EventException::deletion(event.id, None, generated[2], chrono_tz::UTC, Utc::now());

        let responses = apply_exceptions(&event, &generated, &[], &[exception]);
        assert_eq!(responses.len(), 3);
        assert!(responses.iter().all(|response| response.original_start != generated[2]));
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let (event, generated) = series();
        let overrides = ExceptionOverrides {
            title: Some("Retro".to_string()),
            transparency: Some(Transparency::Transparent),
            ..ExceptionOverrides::default()
        };
        let exception = EventException::with_overrides(
            event.id,
            None,
            generated[1],
            chrono_tz::UTC,
            overrides,
            Utc::now(),
        );

        let responses = apply_exceptions(&event, &generated, &[], &[exception.clone()]);
        let edited = &responses[1];
        assert_eq!(edited.title, "Retro");
        assert_eq!(edited.transparency, Transparency::Transparent);
        assert_eq!(edited.location.as_deref(), Some("Room 1"));
        assert_eq!(edited.exception_id, Some(exception.id));
        assert!(edited.modified);
        assert_eq!(responses[0].title, "Standup");
    }

    #[test]
    fn moved_occurrence_is_reordered_by_effective_start() {
        let (event, generated) = series();
        let moved_to = generated[3] + TimeDelta::hours(2);
        let exception = EventException::with_overrides(
            event.id,
            None,
            generated[0],
            chrono_tz::UTC,
            ExceptionOverrides {
                start: Some(moved_to),
                ..ExceptionOverrides::default()
            },
            Utc::now(),
        );

        let responses = apply_exceptions(&event, &generated, &[], &[exception]);
        let last = responses.last().unwrap();
        assert_eq!(last.original_start, generated[0]);
        assert_eq!(last.start, moved_to);
        assert_eq!(last.end, moved_to + TimeDelta::minutes(30));
        assert_eq!(responses[0].original_start, generated[1]);
    }

    #[test]
    fn stored_rows_carry_identity_and_status() {
        let (event, generated) = series();
        let mut occurrence = EventOccurrence::upcoming(event.id, generated[0], chrono_tz::UTC, Utc::now());
        occurrence.status = OccurrenceStatus::Completed;

        let responses = apply_exceptions(&event, &generated, &[occurrence.clone()], &[]);
        assert_eq!(responses[0].occurrence_id, Some(occurrence.id));
        assert_eq!(responses[0].status, OccurrenceStatus::Completed);
        assert_eq!(responses[1].occurrence_id, None);
    }
}
