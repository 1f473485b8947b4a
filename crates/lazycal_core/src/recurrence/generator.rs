//! Occurrence generation.
//!
//! # Responsibility
//! - Expand `(anchor, zone, rule)` into the ordered instants of a series.
//!
//! # Invariants
//! - Pure and deterministic: equal inputs yield equal output.
//! - Calendar arithmetic runs on the anchor's wall-clock time in its own
//!   zone; each candidate is computed from the anchor (`anchor + k * step`)
//!   so clamped months and DST offsets never accumulate drift.
//! - Output is strictly ascending UTC, never before the anchor, always
//!   before the effective bound, and at most `count` long.
//! - The effective bound is `until` (exclusive) when set. A rule with neither
//!   `count` nor `until` stops at the configured horizon; any other rule stops
//!   at a fixed safety ceiling so generation always terminates.

use crate::model::recurrence::{Frequency, RecurrenceRule};
use crate::recurrence::zone::{local_naive, resolve_local};
use chrono::{DateTime, Datelike, Days, Months, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;

/// Horizon applied to open-ended rules unless configured otherwise.
pub const DEFAULT_HORIZON_MONTHS: u32 = 12;
const SAFETY_CEILING_MONTHS: u32 = 100 * 12;

/// Expands recurrence rules into concrete instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceGenerator {
    horizon_months: u32,
}

impl Default for OccurrenceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZON_MONTHS)
    }
}

impl OccurrenceGenerator {
    pub fn new(horizon_months: u32) -> Self {
        Self {
            horizon_months: horizon_months.max(1),
        }
    }

    pub fn horizon_months(&self) -> u32 {
        self.horizon_months
    }

    /// Generates the ordered UTC instants of the series anchored at `anchor`.
    pub fn generate(
        &self,
        anchor: DateTime<Utc>,
        tz: Tz,
        rule: &RecurrenceRule,
    ) -> Vec<DateTime<Utc>> {
        let anchor_local = local_naive(anchor, tz);
        let limit = rule.count.map(|count| count as usize);
        if limit == Some(0) {
            return Vec::new();
        }

        let mut sink = Sink {
            tz,
            anchor,
            bound: self.bound(anchor_local, tz, rule),
            limit,
            out: Vec::new(),
        };
        let interval = rule.interval.max(1);

        match rule.frequency {
            Frequency::Daily => step_days(&mut sink, anchor_local, interval, |_| true),
            Frequency::Weekly => weekly(&mut sink, anchor_local, interval, &rule.by_weekday),
            Frequency::Biweekly => weekly(&mut sink, anchor_local, 2, &rule.by_weekday),
            Frequency::Monthly => monthly(&mut sink, anchor_local, interval, &rule.by_month_day),
            Frequency::Yearly => yearly(&mut sink, anchor_local, interval, &rule.by_month),
            Frequency::Custom => step_days(&mut sink, anchor_local, interval, |local| {
                matches_all_filters(rule, local)
            }),
        }

        sink.out
    }

    fn bound(&self, anchor_local: NaiveDateTime, tz: Tz, rule: &RecurrenceRule) -> DateTime<Utc> {
        let months = if rule.is_open_ended() {
            self.horizon_months
        } else {
            SAFETY_CEILING_MONTHS
        };
        let ceiling = anchor_local
            .checked_add_months(Months::new(months))
            .map(|local| resolve_local(tz, local))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        match rule.until {
            Some(until) => until.min(ceiling),
            None => ceiling,
        }
    }
}

struct Sink {
    tz: Tz,
    anchor: DateTime<Utc>,
    bound: DateTime<Utc>,
    limit: Option<usize>,
    out: Vec<DateTime<Utc>>,
}

impl Sink {
    /// Offers one local candidate. Returns `false` once generation must stop.
    fn offer(&mut self, local: NaiveDateTime, accept: bool) -> bool {
        let candidate = resolve_local(self.tz, local);
        if candidate >= self.bound {
            return false;
        }
        if !accept || candidate < self.anchor {
            return true;
        }
        // Two wall-clock times can collapse onto one instant around a DST gap.
        if self.out.last().is_some_and(|last| *last >= candidate) {
            return true;
        }
        self.out.push(candidate);
        self.limit.map_or(true, |limit| self.out.len() < limit)
    }

    fn is_past_bound(&self, local: NaiveDateTime) -> bool {
        resolve_local(self.tz, local) >= self.bound
    }
}

fn step_days(
    sink: &mut Sink,
    anchor_local: NaiveDateTime,
    step: u32,
    accept: impl Fn(NaiveDateTime) -> bool,
) {
    for k in 0u64.. {
        let Some(local) = anchor_local.checked_add_days(Days::new(k * u64::from(step))) else {
            return;
        };
        if !sink.offer(local, accept(local)) {
            return;
        }
    }
}

fn weekly(sink: &mut Sink, anchor_local: NaiveDateTime, week_interval: u32, by_weekday: &[Weekday]) {
    if by_weekday.is_empty() {
        step_days(sink, anchor_local, week_interval.saturating_mul(7), |_| true);
        return;
    }

    // Weeks are Monday-based and counted from the anchor's own week.
    let anchor_date = anchor_local.date();
    let week_start = anchor_date
        .checked_sub_days(Days::new(u64::from(
            anchor_date.weekday().num_days_from_monday(),
        )))
        .unwrap_or(anchor_date);
    let week_interval = i64::from(week_interval);

    step_days(sink, anchor_local, 1, |local| {
        let weeks_since_anchor = (local.date() - week_start).num_days() / 7;
        by_weekday.contains(&local.weekday()) && weeks_since_anchor % week_interval == 0
    });
}

/// Without a filter, steps the anchor by `interval` months. With a
/// day-of-month filter, every listed calendar day of every `interval`-th
/// month (counted from the anchor's month) is an occurrence, so an anchor day
/// outside the filter still yields the listed days.
fn monthly(sink: &mut Sink, anchor_local: NaiveDateTime, interval: u32, by_month_day: &[u32]) {
    if by_month_day.is_empty() {
        for k in 0u32.. {
            let Some(local) = k
                .checked_mul(interval)
                .and_then(|months| anchor_local.checked_add_months(Months::new(months)))
            else {
                return;
            };
            if !sink.offer(local, true) {
                return;
            }
        }
        return;
    }

    let mut days = by_month_day.to_vec();
    days.sort_unstable();
    days.dedup();
    let time = anchor_local.time();
    let Some(first_of_month) = anchor_local.date().with_day(1) else {
        return;
    };

    for k in 0u32.. {
        let Some(month_start) = k
            .checked_mul(interval)
            .and_then(|months| first_of_month.checked_add_months(Months::new(months)))
        else {
            return;
        };
        if sink.is_past_bound(month_start.and_time(time)) {
            return;
        }
        for day in &days {
            // Calendar-day match: months without this day are skipped.
            let Some(date) = month_start.with_day(*day) else {
                continue;
            };
            if !sink.offer(date.and_time(time), true) {
                return;
            }
        }
    }
}

fn yearly(sink: &mut Sink, anchor_local: NaiveDateTime, interval: u32, by_month: &[u32]) {
    let step_months = interval.saturating_mul(12);
    for k in 0u32.. {
        let Some(local) = k
            .checked_mul(step_months)
            .and_then(|months| anchor_local.checked_add_months(Months::new(months)))
        else {
            return;
        };
        let accept = by_month.is_empty() || by_month.contains(&local.month());
        if !sink.offer(local, accept) {
            return;
        }
    }
}

fn matches_all_filters(rule: &RecurrenceRule, local: NaiveDateTime) -> bool {
    (rule.by_weekday.is_empty() || rule.by_weekday.contains(&local.weekday()))
        && (rule.by_month.is_empty() || rule.by_month.contains(&local.month()))
        && (rule.by_month_day.is_empty() || rule.by_month_day.contains(&local.day()))
}
