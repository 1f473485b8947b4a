//! Subcommand execution.
//!
//! Each command maps its arguments onto a core request, runs it through the
//! series or query service and prints the result as pretty JSON.

use std::io::Write;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use lazycal_core::model::exception::ExceptionOverrides;
use lazycal_core::model::recurrence::{parse_numbers, parse_weekdays};
use lazycal_core::recurrence::zone::{parse_time_zone, resolve_local};
use lazycal_core::{
    CreateEventRequest, EngineConfig, EventListQuery, EventQueryService, NotificationMethod,
    OccurrenceUpdate, RecurrenceRequest, ReminderRequest, SeriesService, Transparency,
    UpdateEventRequest,
};
use rusqlite::Connection;
use serde::Serialize;

use crate::cli::{
    Command, CreateArgs, EditOccurrenceArgs, ListArgs, RecurrenceArgs, UpdateArgs,
};
use crate::error::{CliError, CliResult};

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parses an RFC 3339 timestamp, or a local wall-clock time read in `tz`.
pub fn parse_instant(value: &str, tz: Tz) -> CliResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|local| resolve_local(tz, local))
        .ok_or_else(|| CliError::InvalidArgument(format!("cannot parse timestamp `{value}`")))
}

/// Parses a `METHOD:MINUTES` reminder.
pub fn parse_reminder(value: &str) -> CliResult<ReminderRequest> {
    let (method, minutes) = value
        .split_once(':')
        .ok_or_else(|| CliError::InvalidArgument(format!("reminder `{value}` is not METHOD:MINUTES")))?;
    let method: NotificationMethod = method.parse()?;
    let minutes_before = minutes
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("reminder minutes `{minutes}` is not a number")))?;
    Ok(ReminderRequest {
        method,
        minutes_before,
    })
}

fn recurrence_request(args: &RecurrenceArgs, tz: Tz) -> CliResult<Option<RecurrenceRequest>> {
    let Some(frequency) = args.frequency else {
        return Ok(None);
    };
    let mut request = RecurrenceRequest::new(frequency);
    request.interval = args.interval;
    request.count = args.count;
    if let Some(days) = &args.weekdays {
        request.by_weekday = parse_weekdays(days)?;
    }
    if let Some(months) = &args.months {
        request.by_month = parse_numbers(months, "month")?;
    }
    if let Some(days) = &args.month_days {
        request.by_month_day = parse_numbers(days, "month day")?;
    }
    request.until = args
        .until
        .as_deref()
        .map(|until| parse_instant(until, tz))
        .transpose()?;
    Ok(Some(request))
}

pub fn create_request(args: &CreateArgs) -> CliResult<CreateEventRequest> {
    let tz = parse_time_zone(&args.tz)?;
    let mut request = CreateEventRequest::new(
        args.title.clone(),
        parse_instant(&args.start, tz)?,
        parse_instant(&args.end, tz)?,
        tz,
    );
    request.event_type = args.event_type;
    request.description = args.description.clone();
    request.location = args.location.clone();
    request.color = args.color.clone();
    request.all_day = args.all_day;
    if args.transparent {
        request.transparency = Transparency::Transparent;
    }
    request.recurrence = recurrence_request(&args.recurrence, tz)?;
    request.reminders = args
        .reminders
        .iter()
        .map(String::as_str)
        .map(parse_reminder)
        .collect::<CliResult<_>>()?;
    Ok(request)
}

pub fn update_request(args: &UpdateArgs) -> CliResult<UpdateEventRequest> {
    let tz = parse_time_zone(&args.tz)?;
    Ok(UpdateEventRequest {
        title: args.title.clone(),
        description: args.description.clone(),
        location: args.location.clone(),
        event_type: args.event_type,
        start: args.start.as_deref().map(|v| parse_instant(v, tz)).transpose()?,
        end: args.end.as_deref().map(|v| parse_instant(v, tz)).transpose()?,
        time_zone: args.move_zone.then_some(tz),
        recurrence: recurrence_request(&args.recurrence, tz)?,
        preserve_date_sequence: args.preserve_dates,
        ..UpdateEventRequest::default()
    })
}

pub fn list_query(args: &ListArgs) -> CliResult<EventListQuery> {
    let tz = parse_time_zone(&args.tz)?;
    let mut query = EventListQuery::new(
        args.owner,
        parse_instant(&args.from, tz)?,
        parse_instant(&args.to, tz)?,
    );
    query.event_type = args.event_type;
    query.search = args.search.clone();
    query.page = args.page;
    query.page_size = args.page_size;
    Ok(query)
}

fn occurrence_update(args: &EditOccurrenceArgs, tz: Tz) -> CliResult<OccurrenceUpdate> {
    Ok(OccurrenceUpdate {
        overrides: ExceptionOverrides {
            start: args.start.as_deref().map(|v| parse_instant(v, tz)).transpose()?,
            end: args.end.as_deref().map(|v| parse_instant(v, tz)).transpose()?,
            title: args.title.clone(),
            description: args.description.clone(),
            location: args.location.clone(),
            ..ExceptionOverrides::default()
        },
        status: args.status,
    })
}

fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Runs `command` against an opened database.
pub fn execute(
    command: &Command,
    conn: &Connection,
    config: &EngineConfig,
    out: &mut impl Write,
) -> CliResult<()> {
    match command {
        Command::Create(args) => {
            let request = create_request(args)?;
            let series = SeriesService::try_new(conn, config)?;
            let event = series.create_event(args.owner, &request)?;
            let view = EventQueryService::try_new_sqlite(conn, config)?.get_event(event.id)?;
            print_json(out, &view)
        }
        Command::List(args) => {
            let query = list_query(args)?;
            let result = EventQueryService::try_new_sqlite(conn, config)?.list_events(&query)?;
            print_json(out, &result)
        }
        Command::Show { event_id } => {
            let view = EventQueryService::try_new_sqlite(conn, config)?.get_event(*event_id)?;
            print_json(out, &view)
        }
        Command::Update(args) => {
            let request = update_request(args)?;
            let event = SeriesService::try_new(conn, config)?.update_event(args.event_id, &request)?;
            print_json(out, &event)
        }
        Command::Delete { event_id } => {
            SeriesService::try_new(conn, config)?.delete_event(*event_id)?;
            print_json(out, &serde_json::json!({ "deleted": event_id }))
        }
        Command::DeleteOccurrence { event_id, at, tz } => {
            let original = parse_instant(at, parse_time_zone(tz)?)?;
            let exception =
                SeriesService::try_new(conn, config)?.delete_occurrence(*event_id, original)?;
            print_json(out, &exception)
        }
        Command::EditOccurrence(args) => {
            let tz = parse_time_zone(&args.tz)?;
            let update = occurrence_update(args, tz)?;
            let series = SeriesService::try_new(conn, config)?;
            let edit = match (args.occurrence_id, args.event_id, args.at.as_deref()) {
                (Some(occurrence_id), _, _) => series.update_occurrence_by_id(occurrence_id, &update)?,
                (None, Some(event_id), Some(at)) => {
                    series.update_occurrence(event_id, parse_instant(at, tz)?, &update)?
                }
                _ => {
                    return Err(CliError::InvalidArgument(
                        "pass --occurrence-id or --event-id with --at".to_string(),
                    ))
                }
            };
            print_json(out, &edit)
        }
    }
}
