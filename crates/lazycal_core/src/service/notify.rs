//! Change publication to external collaborators.
//!
//! # Responsibility
//! - Announce committed series writes (cache invalidation, dashboards,
//!   notification fan-out live outside the core).
//!
//! # Invariants
//! - Publication happens only after commit.
//! - Publishing never blocks: a full subscriber queue drops the message for
//!   that subscriber only; disconnected subscribers are pruned.
//! - A publish failure never fails the write that triggered it.

use crate::model::event::{EventId, UserId};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Committed change of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesChange {
    Created {
        event_id: EventId,
        owner_id: UserId,
        occurrences: usize,
    },
    Updated {
        event_id: EventId,
        owner_id: UserId,
    },
    Deleted {
        event_id: EventId,
        owner_id: UserId,
    },
    OccurrenceChanged {
        event_id: EventId,
        owner_id: UserId,
        original_start: DateTime<Utc>,
        deleted: bool,
    },
}

impl SeriesChange {
    pub fn event_id(&self) -> EventId {
        match self {
            Self::Created { event_id, .. }
            | Self::Updated { event_id, .. }
            | Self::Deleted { event_id, .. }
            | Self::OccurrenceChanged { event_id, .. } => *event_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::OccurrenceChanged { .. } => "occurrence_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("{dropped} subscriber(s) lagging; change dropped for them")]
    Lagging { dropped: usize },
}

/// Sink for committed series changes.
pub trait ChangePublisher: Send + Sync {
    fn publish(&self, change: &SeriesChange) -> Result<(), PublishError>;
}

/// Publisher that discards every change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl ChangePublisher for NoopPublisher {
    fn publish(&self, _change: &SeriesChange) -> Result<(), PublishError> {
        Ok(())
    }
}

/// In-process fan-out over bounded channels.
pub struct ChannelPublisher {
    buffer: usize,
    subscribers: Mutex<Vec<SyncSender<SeriesChange>>>,
}

impl ChannelPublisher {
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber with its own bounded queue.
    pub fn subscribe(&self) -> Receiver<SeriesChange> {
        let (tx, rx) = mpsc::sync_channel(self.buffer);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ChangePublisher for ChannelPublisher {
    fn publish(&self, change: &SeriesChange) -> Result<(), PublishError> {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut dropped = 0;
        subscribers.retain(|subscriber| match subscriber.try_send(change.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        debug!(
            "event=change_publish module=notify status=ok change={} event_id={} subscribers={} dropped={}",
            change.kind(),
            change.event_id(),
            subscribers.len(),
            dropped
        );

        if dropped > 0 {
            return Err(PublishError::Lagging { dropped });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangePublisher, ChannelPublisher, PublishError, SeriesChange};
    use uuid::Uuid;

    fn deleted() -> SeriesChange {
        SeriesChange::Deleted {
            event_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn every_subscriber_receives_changes() {
        let publisher = ChannelPublisher::new(4);
        let first = publisher.subscribe();
        let second = publisher.subscribe();
        let change = deleted();

        publisher.publish(&change).unwrap();
        assert_eq!(first.try_recv().unwrap(), change);
        assert_eq!(second.try_recv().unwrap(), change);
    }

    #[test]
    fn full_subscriber_does_not_block_others() {
        let publisher = ChannelPublisher::new(1);
        let slow = publisher.subscribe();
        let fast = publisher.subscribe();

        publisher.publish(&deleted()).unwrap();
        assert!(fast.try_recv().is_ok());

        let err = publisher.publish(&deleted()).unwrap_err();
        assert_eq!(err, PublishError::Lagging { dropped: 1 });
        assert!(fast.try_recv().is_ok());
        assert!(slow.try_recv().is_ok());
        assert!(slow.try_recv().is_err());
    }

    #[test]
    fn disconnected_subscribers_are_pruned() {
        let publisher = ChannelPublisher::new(2);
        let kept = publisher.subscribe();
        drop(publisher.subscribe());

        publisher.publish(&deleted()).unwrap();
        assert_eq!(publisher.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
