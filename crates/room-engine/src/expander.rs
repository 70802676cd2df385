//! Occurrence generation -- expands a recurring series into concrete intervals.
//!
//! The series pattern is translated into an RFC 5545 RRULE and walked with the
//! `rrule` crate's lazy iterator, so local wall-clock time is preserved across
//! DST transitions. End conditions, holiday skips, the query window and the
//! safety cap are all applied while walking. Nothing is cached between calls:
//! every call restarts from the series anchor, which keeps the generator a pure
//! function of `(series, window)`.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dst::parse_tz;
use crate::error::{EngineError, Result};
use crate::exceptions::ExceptionType;
use crate::holiday::HolidayCalendar;
use crate::interval::Interval;
use crate::series::RecurringSeries;

/// Upper bound on occurrences returned by a single expansion.
pub const DEFAULT_SAFETY_CAP: usize = 500;

/// A single occurrence of a recurring series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Start as generated from the pattern; exceptions are keyed on it.
    pub original_start: DateTime<Utc>,
    /// Exception applied to this occurrence, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionType>,
}

impl Occurrence {
    fn generated(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            original_start: start,
            exception: None,
        }
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// Expand `series` into occurrences starting in `[window_start, window_end)`.
///
/// At most `max_occurrences` are returned, and never more than
/// [`DEFAULT_SAFETY_CAP`]. See [`generate_capped`] for the full contract.
pub fn generate(
    series: &RecurringSeries,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    max_occurrences: usize,
    holidays: Option<&dyn HolidayCalendar>,
) -> Result<Vec<Occurrence>> {
    generate_capped(
        series,
        window_start,
        window_end,
        max_occurrences,
        DEFAULT_SAFETY_CAP,
        holidays,
    )
}

/// Expand `series` with an explicit safety cap.
///
/// - Candidates are produced by stepping the pattern from `series.start_time`.
/// - Candidates outside the window are skipped, not terminating.
/// - A date end condition stops at the first candidate after `end_date`;
///   a count end condition stops once `end_count` candidates have been
///   counted from the anchor, including those before the window.
/// - When `skip_holidays` is set and the region has a holiday on the
///   candidate's local date, the candidate is dropped and does not count.
/// - Hitting `min(max_occurrences, safety_cap)` truncates silently.
///
/// # Errors
/// Returns `EngineError::InvalidPattern` / `InvalidInterval` /
/// `InvalidTimezone` when the series itself is malformed, and
/// `EngineError::Rule` if the recurrence library rejects the derived rule.
pub fn generate_capped(
    series: &RecurringSeries,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    max_occurrences: usize,
    safety_cap: usize,
    holidays: Option<&dyn HolidayCalendar>,
) -> Result<Vec<Occurrence>> {
    series.validate()?;

    let limit = max_occurrences.min(safety_cap);
    if limit == 0 || window_start >= window_end {
        return Ok(Vec::new());
    }

    let rule_set = build_rule_set(series)?;
    let skipped_dates = holiday_dates(series, window_end, holidays);
    let duration = series.duration();
    let count_limit = series.pattern.count_limit();
    let date_limit = series.pattern.date_limit();

    let mut counted: u32 = 0;
    let mut occurrences = Vec::new();

    for dt in &rule_set {
        let start: DateTime<Utc> = dt.with_timezone(&Utc);

        if date_limit.is_some_and(|end| start > end) || start >= window_end {
            break;
        }

        if skipped_dates.contains(&dt.date_naive()) {
            debug!(series_id = %series.id, date = %dt.date_naive(), "skipping holiday occurrence");
            continue;
        }

        if let Some(n) = count_limit {
            if counted >= n {
                break;
            }
        }
        counted += 1;

        if start < window_start {
            continue;
        }

        if occurrences.len() >= limit {
            debug!(series_id = %series.id, limit, "occurrence expansion truncated");
            break;
        }

        occurrences.push(Occurrence::generated(start, start + duration));
    }

    Ok(occurrences)
}

/// Build the iCalendar text for `series` and parse it.
fn build_rule_set(series: &RecurringSeries) -> Result<RRuleSet> {
    let tz = parse_tz(&series.timezone)?;
    let local_start = series.start_time.with_timezone(&tz).naive_local();

    let rrule_text = format!(
        "DTSTART;TZID={}:{}\nRRULE:{}",
        series.timezone,
        local_start.format("%Y%m%dT%H%M%S"),
        series.pattern.to_rrule()
    );

    rrule_text
        .parse::<RRuleSet>()
        .map_err(|e| EngineError::Rule(format!("{}", e)))
}

/// Holiday dates to skip, or an empty set when skipping does not apply.
fn holiday_dates(
    series: &RecurringSeries,
    window_end: DateTime<Utc>,
    holidays: Option<&dyn HolidayCalendar>,
) -> BTreeSet<NaiveDate> {
    if !series.pattern.skip_holidays {
        return BTreeSet::new();
    }
    let last = series
        .pattern
        .date_limit()
        .map_or(window_end, |end| end.min(window_end));
    region_holidays(series, series.start_time, last, holidays)
}

/// Local dates in `[from, to]` that are holidays in the series' region,
/// whether or not the pattern skips them.
///
/// Empty when the series names no region, no calendar is given, or the
/// calendar fails.
pub fn region_holidays(
    series: &RecurringSeries,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    holidays: Option<&dyn HolidayCalendar>,
) -> BTreeSet<NaiveDate> {
    let (Some(region), Some(calendar)) = (series.pattern.holiday_region.as_deref(), holidays) else {
        return BTreeSet::new();
    };
    let Ok(tz) = parse_tz(&series.timezone) else {
        return BTreeSet::new();
    };

    let from = from.with_timezone(&tz).date_naive();
    let to = to.with_timezone(&tz).date_naive();
    if to < from {
        return BTreeSet::new();
    }

    match calendar.holidays_between(region, from, to) {
        Ok(dates) => dates,
        Err(e) => {
            warn!(series_id = %series.id, region, error = %e, "holiday calendar unavailable");
            BTreeSet::new()
        }
    }
}
