//! Recurrence rule shape validation.
//!
//! Frequency and weekday values are already typed; unknown text is rejected
//! when it is parsed, so this only checks numeric and temporal bounds.

use crate::model::recurrence::RecurrenceRule;
use crate::model::validation::ValidationError;
use chrono::{DateTime, Utc};

/// Validates one rule at creation time `now`.
///
/// # Errors
/// - `InvalidInterval` when `interval < 1`.
/// - `InvalidCount` when `count` is present and `< 1`.
/// - `UntilNotInFuture` when `until` is present and not strictly after `now`.
/// - `InvalidMonth` / `InvalidMonthDay` for out-of-range filter values.
pub fn validate_rule(rule: &RecurrenceRule, now: DateTime<Utc>) -> Result<(), ValidationError> {
    validate_rule_shape(rule)?;
    if let Some(until) = rule.until {
        if until <= now {
            return Err(ValidationError::UntilNotInFuture { until, now });
        }
    }
    Ok(())
}

/// Validates everything except the creation-time `until` check. Used for
/// stored rules, whose `until` may legitimately be in the past by now.
pub fn validate_rule_shape(rule: &RecurrenceRule) -> Result<(), ValidationError> {
    if rule.interval < 1 {
        return Err(ValidationError::InvalidInterval(rule.interval));
    }
    if let Some(count) = rule.count {
        if count < 1 {
            return Err(ValidationError::InvalidCount(count));
        }
    }
    if let Some(month) = rule.by_month.iter().find(|month| !(1..=12).contains(*month)) {
        return Err(ValidationError::InvalidMonth(*month));
    }
    if let Some(day) = rule
        .by_month_day
        .iter()
        .find(|day| !(1..=31).contains(*day))
    {
        return Err(ValidationError::InvalidMonthDay(*day));
    }
    Ok(())
}
