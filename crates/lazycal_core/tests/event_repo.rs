use chrono::{DateTime, TimeDelta, TimeZone, Utc, Weekday};
use lazycal_core::db::open_db_in_memory;
use lazycal_core::model::event::{Event, EventType};
use lazycal_core::model::exception::{EventException, ExceptionOverrides};
use lazycal_core::model::occurrence::{EventOccurrence, OccurrenceStatus};
use lazycal_core::model::recurrence::{Frequency, RecurrenceRule};
use lazycal_core::model::reminder::{NotificationMethod, Reminder};
use lazycal_core::model::validation::ValidationError;
use lazycal_core::repo::event_repo::{EventListFilter, EventRepository, SqliteEventRepository};
use lazycal_core::repo::occurrence_repo::{OccurrenceRepository, SqliteOccurrenceRepository};
use lazycal_core::RepoError;
use rusqlite::Connection;
use uuid::Uuid;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2031, 3, day, hour, 0, 0).unwrap()
}

fn event(owner: Uuid, title: &str, day: u32) -> Event {
    let mut event = Event::new(owner, title, at(day, 9), at(day, 10), chrono_tz::UTC);
    event.created_at = at(1, 0);
    event.updated_at = at(1, 0);
    event
}

fn filter(owner: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> EventListFilter {
    EventListFilter {
        owner_id: owner,
        range_start: from,
        range_end: to,
        event_type: None,
        search: None,
        limit: None,
        offset: 0,
    }
}

#[test]
fn event_create_get_update_delete_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let mut event = event(Uuid::new_v4(), "Dentist", 10);
    event.location = Some("Main St".to_string());
    event.event_type = EventType::Appointment;

    repo.create_event(&event).unwrap();
    assert_eq!(repo.get_event(event.id).unwrap(), Some(event.clone()));

    event.title = "Dentist (moved)".to_string();
    event.start = at(11, 9);
    event.end = at(11, 10);
    repo.update_event(&event).unwrap();
    assert_eq!(repo.get_event(event.id).unwrap(), Some(event.clone()));

    repo.delete_event(event.id).unwrap();
    assert_eq!(repo.get_event(event.id).unwrap(), None);
    assert!(matches!(
        repo.delete_event(event.id),
        Err(RepoError::EventNotFound(id)) if id == event.id
    ));
}

#[test]
fn create_event_rejects_invalid_records_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let mut event = event(Uuid::new_v4(), "   ", 10);

    assert!(matches!(
        repo.create_event(&event),
        Err(RepoError::Validation(ValidationError::EmptyTitle))
    ));

    event.title = "Backwards".to_string();
    event.end = event.start;
    assert!(matches!(
        repo.create_event(&event),
        Err(RepoError::Validation(ValidationError::InvalidTimeRange { .. }))
    ));
}

#[test]
fn rule_round_trips_filters_and_bounds() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let event = event(Uuid::new_v4(), "Gym", 3);
    repo.create_event(&event).unwrap();

    let mut rule = RecurrenceRule::new(event.id, Frequency::Weekly);
    rule.by_weekday = vec![Weekday::Mon, Weekday::Wed, Weekday::Fri];
    rule.count = Some(12);
    rule.until = Some(at(30, 0));
    repo.create_rule(&rule).unwrap();

    assert_eq!(repo.get_rule_for_event(event.id).unwrap(), Some(rule));
    assert!(repo.delete_rule_for_event(event.id).unwrap());
    assert!(!repo.delete_rule_for_event(event.id).unwrap());
    assert_eq!(repo.get_rule_for_event(event.id).unwrap(), None);
}

#[test]
fn reminders_are_listed_and_deleted_per_event() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let event = event(Uuid::new_v4(), "Flight", 5);
    repo.create_event(&event).unwrap();

    let early = Reminder::new(event.id, NotificationMethod::Email, 1440, at(1, 0));
    let late = Reminder::new(event.id, NotificationMethod::Push, 15, at(1, 0));
    repo.create_reminder(&late).unwrap();
    repo.create_reminder(&early).unwrap();

    assert_eq!(repo.list_reminders(event.id).unwrap(), vec![early, late]);
    assert_eq!(repo.delete_reminders_for_event(event.id).unwrap(), 2);
    assert!(repo.list_reminders(event.id).unwrap().is_empty());
}

#[test]
fn list_events_is_owner_scoped_and_filtered() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let owner = Uuid::new_v4();

    let mut review = event(owner, "Design review", 4);
    review.description = Some("100% coverage talk".to_string());
    let mut lunch = event(owner, "Lunch", 5);
    lunch.event_type = EventType::Other;
    let late = event(owner, "Late", 25);
    let stranger = event(Uuid::new_v4(), "Design review", 4);
    for event in [&review, &lunch, &late, &stranger] {
        repo.create_event(event).unwrap();
    }

    let window = filter(owner, at(1, 0), at(10, 0));
    let listed = repo.list_events(&window).unwrap();
    assert_eq!(
        listed.iter().map(|event| event.id).collect::<Vec<_>>(),
        vec![review.id, lunch.id]
    );
    assert_eq!(repo.count_events(&window).unwrap(), 2);

    let typed = EventListFilter {
        event_type: Some(EventType::Other),
        ..window.clone()
    };
    assert_eq!(repo.list_events(&typed).unwrap(), vec![lunch.clone()]);

    let searched = EventListFilter {
        search: Some("100%".to_string()),
        ..window.clone()
    };
    assert_eq!(repo.list_events(&searched).unwrap(), vec![review.clone()]);

    let paged = EventListFilter {
        limit: Some(1),
        offset: 1,
        ..window
    };
    assert_eq!(repo.list_events(&paged).unwrap(), vec![lunch]);
}

#[test]
fn recurring_events_are_candidates_until_their_rule_ends() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let owner = Uuid::new_v4();

    let open = event(owner, "Standup", 2);
    let ended = event(owner, "Sprint", 2);
    repo.create_event(&open).unwrap();
    repo.create_event(&ended).unwrap();
    repo.create_rule(&RecurrenceRule::new(open.id, Frequency::Daily))
        .unwrap();
    let mut bounded = RecurrenceRule::new(ended.id, Frequency::Daily);
    bounded.until = Some(at(6, 0));
    repo.create_rule(&bounded).unwrap();

    let later = filter(owner, at(20, 0), at(21, 0));
    assert_eq!(repo.list_events(&later).unwrap(), vec![open]);
}

#[test]
fn exception_moved_into_range_makes_its_series_a_candidate() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let repo = SqliteOccurrenceRepository::try_new(&conn).unwrap();
    let owner = Uuid::new_v4();
    let series = event(owner, "Offsite", 20);
    events.create_event(&series).unwrap();
    events
        .create_rule(&RecurrenceRule::new(series.id, Frequency::Weekly))
        .unwrap();

    let window = filter(owner, at(5, 0), at(6, 0));
    assert!(events.list_events(&window).unwrap().is_empty());

    let mut moved = EventException::with_overrides(
        series.id,
        None,
        series.start,
        chrono_tz::UTC,
        ExceptionOverrides {
            start: Some(at(5, 9)),
            ..ExceptionOverrides::default()
        },
        at(1, 0),
    );
    repo.create_exception(&moved).unwrap();
    assert_eq!(events.list_events(&window).unwrap(), vec![series.clone()]);
    assert_eq!(events.count_events(&window).unwrap(), 1);

    moved.deleted = true;
    repo.update_exception(&moved).unwrap();
    assert!(events.list_events(&window).unwrap().is_empty());
}

#[test]
fn rule_until_can_be_moved_in_place() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&conn).unwrap();
    let series = event(Uuid::new_v4(), "Standup", 2);
    repo.create_event(&series).unwrap();
    let mut rule = RecurrenceRule::new(series.id, Frequency::Daily);
    rule.until = Some(at(6, 0));
    repo.create_rule(&rule).unwrap();

    assert!(repo.set_rule_until(series.id, Some(at(8, 0))).unwrap());

    let stored = repo.get_rule_for_event(series.id).unwrap().unwrap();
    assert_eq!(stored.id, rule.id);
    assert_eq!(stored.until, Some(at(8, 0)));
    assert!(!repo.set_rule_until(Uuid::new_v4(), None).unwrap());
}

#[test]
fn occurrences_and_exceptions_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let repo = SqliteOccurrenceRepository::try_new(&conn).unwrap();
    let event = event(Uuid::new_v4(), "Standup", 2);
    events.create_event(&event).unwrap();

    let rows: Vec<EventOccurrence> = (0..3)
        .map(|day| {
            EventOccurrence::upcoming(
                event.id,
                event.start + TimeDelta::days(day),
                chrono_tz::UTC,
                at(1, 0),
            )
        })
        .collect();
    for row in &rows {
        repo.create_occurrence(row).unwrap();
    }

    let mut second = rows[1].clone();
    second.status = OccurrenceStatus::Completed;
    repo.update_occurrence(&second).unwrap();
    assert_eq!(repo.get_occurrence(second.id).unwrap(), Some(second.clone()));
    assert_eq!(
        repo.get_occurrence_at(event.id, second.occurs_at).unwrap(),
        Some(second.clone())
    );
    assert_eq!(
        repo.list_occurrences_in_range(event.id, rows[1].occurs_at, rows[2].occurs_at)
            .unwrap()
            .len(),
        2
    );

    let overrides = ExceptionOverrides {
        title: Some("Retro".to_string()),
        start: Some(second.occurs_at + TimeDelta::hours(2)),
        ..ExceptionOverrides::default()
    };
    let exception = EventException::with_overrides(
        event.id,
        Some(second.id),
        second.occurs_at,
        chrono_tz::UTC,
        overrides,
        at(1, 0),
    );
    repo.create_exception(&exception).unwrap();
    assert_eq!(
        repo.get_exception_by_original(event.id, second.occurs_at)
            .unwrap(),
        Some(exception.clone())
    );
    assert_eq!(
        repo.list_exceptions_by_occurrence(second.id).unwrap(),
        vec![exception.clone()]
    );

    assert_eq!(repo.detach_exceptions_from_occurrence(second.id).unwrap(), 1);
    repo.delete_occurrence(second.id).unwrap();
    let detached = repo
        .get_exception_by_original(event.id, second.occurs_at)
        .unwrap()
        .unwrap();
    assert_eq!(detached.occurrence_id, None);
    assert_eq!(detached.overrides, exception.overrides);

    assert_eq!(repo.delete_exceptions_for_event(event.id).unwrap(), 1);
    assert_eq!(repo.delete_occurrences_for_event(event.id).unwrap(), 2);
}

#[test]
fn duplicate_exception_for_same_original_instant_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let repo = SqliteOccurrenceRepository::try_new(&conn).unwrap();
    let event = event(Uuid::new_v4(), "Standup", 2);
    events.create_event(&event).unwrap();

    let first = EventException::deletion(event.id, None, event.start, chrono_tz::UTC, at(1, 0));
    let second = EventException::deletion(event.id, None, event.start, chrono_tz::UTC, at(1, 0));
    repo.create_exception(&first).unwrap();
    assert!(matches!(repo.create_exception(&second), Err(RepoError::Db(_))));
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    assert!(matches!(
        SqliteEventRepository::try_new(&conn),
        Err(RepoError::UninitializedConnection("events"))
    ));
    assert!(matches!(
        SqliteOccurrenceRepository::try_new(&conn),
        Err(RepoError::UninitializedConnection("event_occurrences"))
    ));
}
