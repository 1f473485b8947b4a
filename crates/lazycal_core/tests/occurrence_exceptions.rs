use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use lazycal_core::db::open_db_in_memory;
use lazycal_core::model::exception::ExceptionOverrides;
use lazycal_core::model::recurrence::Frequency;
use lazycal_core::model::validation::ValidationError;
use lazycal_core::repo::occurrence_repo::{OccurrenceRepository, SqliteOccurrenceRepository};
use lazycal_core::{
    ChannelPublisher, CreateEventRequest, EngineConfig, ErrorKind, Event, EventException,
    OccurrenceRef, OccurrenceStatus, OccurrenceUpdate, RecurrenceRequest, SeriesChange,
    SeriesService, ServiceError,
};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2031, 2, 3, 9, 0, 0).unwrap() + TimeDelta::days(n)
}

fn daily_series(service: &SeriesService<'_>, count: u32) -> Event {
    let mut request = CreateEventRequest::new("Standup", day(0), day(0) + TimeDelta::minutes(15), chrono_tz::UTC);
    let mut recurrence = RecurrenceRequest::new(Frequency::Daily);
    recurrence.count = Some(count);
    request.recurrence = Some(recurrence);
    service.create_event(Uuid::new_v4(), &request).unwrap()
}

fn exceptions(conn: &Connection, event: &Event) -> Vec<EventException> {
    SqliteOccurrenceRepository::try_new(conn)
        .unwrap()
        .list_exceptions(event.id)
        .unwrap()
}

fn retitle(title: &str) -> OccurrenceUpdate {
    OccurrenceUpdate {
        overrides: ExceptionOverrides {
            title: Some(title.to_string()),
            ..ExceptionOverrides::default()
        },
        status: None,
    }
}

fn set_status(status: OccurrenceStatus) -> OccurrenceUpdate {
    OccurrenceUpdate {
        overrides: ExceptionOverrides::default(),
        status: Some(status),
    }
}

#[test]
fn deleting_third_occurrence_writes_exactly_one_deleted_exception() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 5);

    let exception = service.delete_occurrence(event.id, day(2)).unwrap();

    assert!(exception.deleted);
    assert_eq!(exception.original_start, day(2));
    assert_eq!(exceptions(&conn, &event), vec![exception.clone()]);
    let rows = SqliteOccurrenceRepository::try_new(&conn)
        .unwrap()
        .list_occurrences(event.id)
        .unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(exception.occurrence_id, Some(rows[2].id));
}

#[test]
fn repeated_edits_merge_into_one_exception() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 5);

    let first = service
        .update_occurrence(event.id, day(1), &retitle("Planning"))
        .unwrap()
        .exception
        .unwrap();
    let moved = OccurrenceUpdate {
        overrides: ExceptionOverrides {
            start: Some(day(1) + TimeDelta::hours(3)),
            location: Some("Room 7".to_string()),
            ..ExceptionOverrides::default()
        },
        status: None,
    };
    let second = service
        .update_occurrence(event.id, day(1), &moved)
        .unwrap()
        .exception
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.overrides.title.as_deref(), Some("Planning"));
    assert_eq!(second.overrides.location.as_deref(), Some("Room 7"));
    assert_eq!(second.overrides.start, Some(day(1) + TimeDelta::hours(3)));
    assert_eq!(exceptions(&conn, &event), vec![second]);
}

#[test]
fn deleting_an_edited_occurrence_reuses_its_exception() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);
    let edited = service
        .update_occurrence(event.id, day(1), &retitle("Planning"))
        .unwrap()
        .exception
        .unwrap();

    let deleted = service.delete_occurrence(event.id, day(1)).unwrap();
    let again = service.delete_occurrence(event.id, day(1)).unwrap();

    assert_eq!(deleted.id, edited.id);
    assert_eq!(again.id, edited.id);
    assert!(again.deleted);
    assert_eq!(again.overrides.title.as_deref(), Some("Planning"));
    assert_eq!(exceptions(&conn, &event).len(), 1);
}

#[test]
fn edit_by_id_and_by_instant_address_the_same_exception() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);
    let row = SqliteOccurrenceRepository::try_new(&conn)
        .unwrap()
        .get_occurrence_at(event.id, day(2))
        .unwrap()
        .unwrap();

    let by_id = service
        .update_occurrence_by_id(row.id, &retitle("By id"))
        .unwrap()
        .exception
        .unwrap();
    let by_instant = service
        .update_occurrence(event.id, day(2), &retitle("By instant"))
        .unwrap()
        .exception
        .unwrap();

    assert_eq!(by_id.id, by_instant.id);
    assert_eq!(by_instant.occurrence_id, Some(row.id));
    assert_eq!(exceptions(&conn, &event).len(), 1);
}

#[test]
fn status_only_update_writes_no_exception() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);

    let edit = service
        .update_occurrence(event.id, day(0), &set_status(OccurrenceStatus::Completed))
        .unwrap();

    assert_eq!(edit.exception, None);
    let occurrence = edit.occurrence.unwrap();
    assert_eq!(occurrence.status, OccurrenceStatus::Completed);
    assert_eq!(
        SqliteOccurrenceRepository::try_new(&conn)
            .unwrap()
            .get_occurrence(occurrence.id)
            .unwrap()
            .unwrap()
            .status,
        OccurrenceStatus::Completed
    );
    assert!(exceptions(&conn, &event).is_empty());
}

#[test]
fn finished_occurrences_cannot_change_status_again() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);
    service
        .update_occurrence(event.id, day(1), &set_status(OccurrenceStatus::Cancelled))
        .unwrap();

    let err = service
        .update_occurrence(event.id, day(1), &set_status(OccurrenceStatus::Completed))
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::InvalidStatusTransition {
            from: OccurrenceStatus::Cancelled,
            to: OccurrenceStatus::Completed,
        })
    ));
}

#[test]
fn unstored_generated_instant_is_materialized_on_status_change() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);
    let repo = SqliteOccurrenceRepository::try_new(&conn).unwrap();
    let row = repo.get_occurrence_at(event.id, day(2)).unwrap().unwrap();
    repo.delete_occurrence(row.id).unwrap();

    let edit = service
        .update_occurrence(event.id, day(2), &set_status(OccurrenceStatus::Completed))
        .unwrap();

    let created = edit.occurrence.unwrap();
    assert_ne!(created.id, row.id);
    assert_eq!(created.occurs_at, day(2));
    assert_eq!(
        repo.get_occurrence_at(event.id, day(2)).unwrap(),
        Some(created)
    );
}

#[test]
fn override_span_must_stay_valid() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);
    let inverted = OccurrenceUpdate {
        overrides: ExceptionOverrides {
            end: Some(day(1) - TimeDelta::hours(1)),
            ..ExceptionOverrides::default()
        },
        status: None,
    };

    let err = service
        .update_occurrence(event.id, day(1), &inverted)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(exceptions(&conn, &event).is_empty());
}

#[test]
fn empty_occurrence_update_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);

    assert!(matches!(
        service.update_occurrence(event.id, day(0), &OccurrenceUpdate::default()),
        Err(ServiceError::Validation(ValidationError::EmptyUpdate))
    ));
}

#[test]
fn single_events_have_no_individual_occurrences() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let request = CreateEventRequest::new("Dentist", day(0), day(0) + TimeDelta::hours(1), chrono_tz::UTC);
    let event = service.create_event(Uuid::new_v4(), &request).unwrap();

    let err = service.delete_occurrence(event.id, day(0)).unwrap_err();
    assert!(matches!(err, ServiceError::NotRecurring(id) if id == event.id));
    assert_eq!(err.kind(), ErrorKind::Consistency);

    let err = service
        .update_occurrence(event.id, day(0), &retitle("Other"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn unknown_references_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = SeriesService::try_new(&conn, &EngineConfig::default()).unwrap();
    let event = daily_series(&service, 3);

    let off_series = day(1) + TimeDelta::minutes(5);
    let err = service.delete_occurrence(event.id, off_series).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::OccurrenceNotFound(OccurrenceRef::Instant { event_id, original_start })
            if event_id == event.id && original_start == off_series
    ));

    let err = service.delete_occurrence(event.id, day(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let missing = Uuid::new_v4();
    let err = service
        .update_occurrence_by_id(missing, &retitle("Ghost"))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::OccurrenceNotFound(OccurrenceRef::Id(id)) if id == missing
    ));

    let err = service.delete_occurrence(Uuid::new_v4(), day(0)).unwrap_err();
    assert!(matches!(err, ServiceError::EventNotFound(_)));
}

#[test]
fn occurrence_changes_are_published_after_commit() {
    let conn = open_db_in_memory().unwrap();
    let publisher = Arc::new(ChannelPublisher::new(8));
    let changes = publisher.subscribe();
    let service = SeriesService::try_new(&conn, &EngineConfig::default())
        .unwrap()
        .with_publisher(publisher);
    let event = daily_series(&service, 3);
    let _created = changes.try_recv().unwrap();

    service.delete_occurrence(event.id, day(1)).unwrap();

    assert_eq!(
        changes.try_recv().unwrap(),
        SeriesChange::OccurrenceChanged {
            event_id: event.id,
            owner_id: event.owner_id,
            original_start: day(1),
            deleted: true,
        }
    );
}
