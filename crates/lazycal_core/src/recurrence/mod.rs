//! Recurrence engine: rule validation, occurrence generation and exception
//! overlay.
//!
//! # Invariants
//! - Everything in this module is pure; nothing here touches storage.
//! - Generation is re-run on every read; stored rows only annotate it.

pub mod generator;
pub mod overlay;
pub mod validator;
pub mod zone;

pub use generator::{OccurrenceGenerator, DEFAULT_HORIZON_MONTHS};
pub use overlay::{apply_exceptions, OccurrenceResponse};
pub use validator::validate_rule;
