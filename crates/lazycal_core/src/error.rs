//! Caller-facing error taxonomy.
//!
//! # Invariants
//! - Callers branch on `ServiceError::kind()`, never on message text.
//! - Repository `*NotFound` errors keep their identity; every other storage
//!   failure collapses into `Storage`.

use crate::model::event::EventId;
use crate::model::exception::ExceptionId;
use crate::model::occurrence::OccurrenceId;
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse error class for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected input; nothing was written.
    Validation,
    /// Event, occurrence or exception is absent.
    NotFound,
    /// Request conflicts with the shape of stored data.
    Consistency,
    /// Store failure; the whole unit was rolled back and may be retried.
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Consistency => "consistency",
            Self::Storage => "storage",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a caller addressed a single occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceRef {
    Id(OccurrenceId),
    Instant {
        event_id: EventId,
        original_start: DateTime<Utc>,
    },
}

impl Display for OccurrenceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Instant {
                event_id,
                original_start,
            } => write!(f, "{event_id}@{}", original_start.to_rfc3339()),
        }
    }
}

/// Error returned by series and query services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("event not found: {0}")]
    EventNotFound(EventId),
    #[error("occurrence not found: {0}")]
    OccurrenceNotFound(OccurrenceRef),
    #[error("exception not found: {0}")]
    ExceptionNotFound(ExceptionId),
    /// Single-occurrence operation on an event without a rule.
    #[error("event {0} is not recurring")]
    NotRecurring(EventId),
    #[error("storage failure: {0}")]
    Storage(#[source] RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::EventNotFound(_) | Self::OccurrenceNotFound(_) | Self::ExceptionNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::NotRecurring(_) => ErrorKind::Consistency,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable code used in log lines and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::EventNotFound(_) => "event_not_found",
            Self::OccurrenceNotFound(_) => "occurrence_not_found",
            Self::ExceptionNotFound(_) => "exception_not_found",
            Self::NotRecurring(_) => "event_not_recurring",
            Self::Storage(_) => "storage_failed",
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::EventNotFound(id) => Self::EventNotFound(id),
            RepoError::OccurrenceNotFound(id) => Self::OccurrenceNotFound(OccurrenceRef::Id(id)),
            RepoError::ExceptionNotFound(id) => Self::ExceptionNotFound(id),
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, OccurrenceRef, ServiceError};
    use crate::model::validation::ValidationError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repository_not_found_keeps_its_kind() {
        let id = Uuid::new_v4();
        let err = ServiceError::from(RepoError::OccurrenceNotFound(id));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(
            err,
            ServiceError::OccurrenceNotFound(OccurrenceRef::Id(found)) if found == id
        ));
    }

    #[test]
    fn other_repository_errors_become_storage() {
        let err = ServiceError::from(RepoError::InvalidData("bad row".to_string()));
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.code(), "storage_failed");

        let err = ServiceError::from(RepoError::Validation(ValidationError::EmptyTitle));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn not_recurring_is_a_consistency_error() {
        let err = ServiceError::NotRecurring(Uuid::new_v4());
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(err.kind().as_str(), "consistency");
    }
}
