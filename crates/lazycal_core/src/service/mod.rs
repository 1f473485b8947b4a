//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into series-level write and read APIs.
//! - Keep callers (CLI, future transports) decoupled from storage details.

pub mod notify;
pub mod query_service;
pub mod request;
pub mod series_service;

pub use notify::{ChangePublisher, ChannelPublisher, NoopPublisher, PublishError, SeriesChange};
pub use query_service::{EventListQuery, EventListResult, EventQueryService, EventView};
pub use request::{
    CreateEventRequest, OccurrenceUpdate, RecurrenceRequest, ReminderRequest, UpdateEventRequest,
};
pub use series_service::{OccurrenceEdit, SeriesService};
