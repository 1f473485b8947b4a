//! Core domain logic for LazyCal.
//! This crate is the single source of truth for series, occurrence and
//! exception invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod recurrence;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{ErrorKind, OccurrenceRef, ServiceError, ServiceResult};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::event::{Event, EventId, EventType, Transparency, UserId};
pub use model::exception::{EventException, ExceptionId, ExceptionOverrides};
pub use model::occurrence::{EventOccurrence, OccurrenceId, OccurrenceStatus};
pub use model::recurrence::{Frequency, RecurrenceRule, RuleId};
pub use model::reminder::{NotificationMethod, Reminder, ReminderId};
pub use model::validation::ValidationError;
pub use recurrence::{apply_exceptions, validate_rule, OccurrenceGenerator, OccurrenceResponse};
pub use repo::{RepoError, RepoResult};
pub use service::{
    ChangePublisher, ChannelPublisher, CreateEventRequest, EventListQuery, EventListResult,
    EventQueryService, EventView, NoopPublisher, OccurrenceEdit, OccurrenceUpdate,
    RecurrenceRequest, ReminderRequest, SeriesChange, SeriesService, UpdateEventRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
