//! Calendar domain model.
//!
//! # Responsibility
//! - Define canonical records for series anchors, rules, materialized
//!   occurrences, sparse exceptions and reminders.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Instants are UTC; each event/occurrence/exception also records the
//!   zone its calendar arithmetic runs in.

pub mod event;
pub mod exception;
pub mod occurrence;
pub mod recurrence;
pub mod reminder;
pub mod validation;
