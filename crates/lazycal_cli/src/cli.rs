//! Command-line interface definition.
//!
//! Timestamps are RFC 3339 (`2031-01-06T09:00:00+01:00`) or a local
//! `YYYY-MM-DDTHH:MM[:SS]` read in the command's `--tz`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lazycal_core::{EventType, Frequency, OccurrenceStatus};
use uuid::Uuid;

/// lazycal - recurring calendar series on a local SQLite store
#[derive(Debug, Parser)]
#[command(name = "lazycal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "LAZYCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database (overrides `[storage] database_path`)
    #[arg(long, env = "LAZYCAL_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an event, optionally recurring
    Create(CreateArgs),
    /// List events overlapping a time range
    List(ListArgs),
    /// Show one event with its full occurrence list
    Show {
        event_id: Uuid,
    },
    /// Update an event and reschedule its series
    Update(UpdateArgs),
    /// Delete an event with its whole series
    Delete {
        event_id: Uuid,
    },
    /// Suppress one occurrence of a series
    DeleteOccurrence {
        event_id: Uuid,
        /// Original start of the occurrence
        #[arg(long)]
        at: String,
        /// Zone for timestamps given without offset
        #[arg(long, default_value = "UTC")]
        tz: String,
    },
    /// Override fields or status of one occurrence
    EditOccurrence(EditOccurrenceArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Owner of the event
    #[arg(long, env = "LAZYCAL_OWNER")]
    pub owner: Uuid,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub start: String,
    #[arg(long)]
    pub end: String,
    /// IANA zone the series is generated in
    #[arg(long, default_value = "UTC")]
    pub tz: String,
    #[arg(long = "type", default_value = "meeting")]
    pub event_type: EventType,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub all_day: bool,
    /// Do not block time for this event
    #[arg(long)]
    pub transparent: bool,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
    /// Reminder as `METHOD:MINUTES`, e.g. `email:30` (can be repeated)
    #[arg(long = "remind", action = clap::ArgAction::Append)]
    pub reminders: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RecurrenceArgs {
    /// Recurrence frequency: daily, weekly, biweekly, monthly, yearly, custom
    #[arg(long = "freq")]
    pub frequency: Option<Frequency>,
    #[arg(long, default_value_t = 1)]
    pub interval: u32,
    /// Weekday filter, e.g. `MO,WE,FR`
    #[arg(long)]
    pub weekdays: Option<String>,
    /// Month filter, e.g. `1,6`
    #[arg(long)]
    pub months: Option<String>,
    /// Day-of-month filter, e.g. `1,15`
    #[arg(long)]
    pub month_days: Option<String>,
    #[arg(long)]
    pub count: Option<u32>,
    /// Exclusive end of the series
    #[arg(long)]
    pub until: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, env = "LAZYCAL_OWNER")]
    pub owner: Uuid,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    #[arg(long, default_value = "UTC")]
    pub tz: String,
    #[arg(long = "type")]
    pub event_type: Option<EventType>,
    /// Substring of title or description
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub event_id: Uuid,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    /// Zone used to read timestamps and, with `--move-zone`, the new series zone
    #[arg(long, default_value = "UTC")]
    pub tz: String,
    /// Store `--tz` as the event's zone
    #[arg(long)]
    pub move_zone: bool,
    #[arg(long = "type")]
    pub event_type: Option<EventType>,
    /// Keep each occurrence's date and change only its time of day
    #[arg(long)]
    pub preserve_dates: bool,
    // Replaces the recurrence rule when `--freq` is given.
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

#[derive(Debug, Args)]
pub struct EditOccurrenceArgs {
    /// Stored occurrence id
    #[arg(long, conflicts_with_all = ["event_id", "at"])]
    pub occurrence_id: Option<Uuid>,
    #[arg(long, requires = "at")]
    pub event_id: Option<Uuid>,
    /// Original start of the occurrence
    #[arg(long, requires = "event_id")]
    pub at: Option<String>,
    #[arg(long, default_value = "UTC")]
    pub tz: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    /// New status: completed or cancelled
    #[arg(long)]
    pub status: Option<OccurrenceStatus>,
}
