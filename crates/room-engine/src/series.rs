//! Recurring series: lifecycle, batch operations and pattern edits.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dst::{parse_tz, resolve_local, DstPolicy};
use crate::error::{EngineError, Result};
use crate::expander;
use crate::holiday::HolidayCalendar;
use crate::interval::Interval;
use crate::pattern::{self, EndCondition, RecurrencePattern};
use crate::reservation::{Reservation, ReservationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesStatus {
    #[default]
    Active,
    Paused,
    /// Soft-deleted.
    Cancelled,
}

/// A recurring booking: a pattern anchored at a first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSeries {
    pub id: String,
    pub room_id: String,
    pub organizer_id: String,
    pub pattern: RecurrencePattern,
    /// Start of the first (anchor) occurrence.
    pub start_time: DateTime<Utc>,
    /// End of the first occurrence; every occurrence lasts `end - start`.
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    /// Gap kept clear around each occurrence during conflict checks.
    #[serde(default)]
    pub buffer_minutes: u32,
    /// How many days past "now" occurrences may be materialized.
    #[serde(default)]
    pub max_booking_ahead_days: Option<u32>,
    #[serde(default)]
    pub status: SeriesStatus,
}

impl RecurringSeries {
    pub fn new(
        id: impl Into<String>,
        room_id: impl Into<String>,
        organizer_id: impl Into<String>,
        pattern: RecurrencePattern,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            organizer_id: organizer_id.into(),
            pattern,
            start_time,
            end_time,
            timezone: timezone.into(),
            buffer_minutes: 0,
            max_booking_ahead_days: None,
            status: SeriesStatus::Active,
        }
    }

    pub fn with_buffer(mut self, minutes: u32) -> Self {
        self.buffer_minutes = minutes;
        self
    }

    pub fn with_max_booking_ahead(mut self, days: u32) -> Self {
        self.max_booking_ahead_days = Some(days);
        self
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Check the anchor interval, timezone and pattern.
    pub fn validate(&self) -> Result<()> {
        Interval::new(self.start_time, self.end_time)?;
        parse_tz(&self.timezone)?;
        pattern::validate(&self.pattern, self.start_time).into_result()
    }

    /// Latest instant an occurrence may start at when booking at `now`.
    ///
    /// Saturates at the latest representable instant.
    pub fn booking_horizon(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_booking_ahead_days.map(|days| {
            Duration::try_days(i64::from(days))
                .and_then(|ahead| now.checked_add_signed(ahead))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    /// Replace the pattern, either for the whole series or from `effective_from` on.
    ///
    /// A retroactive edit (or one effective at or before the anchor) rewrites
    /// this series in place. Otherwise the series is split: the part before
    /// `effective_from` keeps the old pattern and ends just before it, and a
    /// new series `new_id` starts at the first local day on or
    /// after `effective_from`, at the original local time of day.
    pub fn edit_pattern(
        &self,
        new_pattern: RecurrencePattern,
        effective_from: DateTime<Utc>,
        new_id: impl Into<String>,
        retroactive: bool,
        holidays: Option<&dyn HolidayCalendar>,
    ) -> Result<SeriesEdit> {
        if retroactive || effective_from <= self.start_time {
            let mut current = self.clone();
            current.pattern = new_pattern;
            current.validate()?;
            return Ok(SeriesEdit {
                previous: None,
                current,
                cancelled_reservations: 0,
            });
        }

        let tz = parse_tz(&self.timezone)?;
        let local_anchor = self.start_time.with_timezone(&tz);
        let from_local = effective_from.with_timezone(&tz);

        let mut new_start = resolve_local(
            tz,
            from_local.date_naive().and_time(local_anchor.time()),
            DstPolicy::ShiftForward,
        )
        .ok_or_else(|| EngineError::InvalidTimezone(self.timezone.clone()))?;
        if new_start < effective_from {
            let next_day = from_local.date_naive() + Duration::days(1);
            new_start = resolve_local(
                tz,
                next_day.and_time(local_anchor.time()),
                DstPolicy::ShiftForward,
            )
            .ok_or_else(|| EngineError::InvalidTimezone(self.timezone.clone()))?;
        }

        let mut current = self.clone();
        current.id = new_id.into();
        current.pattern = new_pattern;
        current.start_time = new_start;
        current.end_time = new_start + self.duration();
        current.validate()?;

        let previous = self.truncated_before(effective_from, holidays)?;

        debug!(
            series_id = %self.id,
            new_series_id = %current.id,
            %effective_from,
            kept = previous.is_some(),
            "split series for forward pattern edit"
        );

        Ok(SeriesEdit {
            previous,
            current,
            cancelled_reservations: 0,
        })
    }

    /// This series cut off just before `effective_from`, or `None` when no
    /// occurrence falls before it.
    fn truncated_before(
        &self,
        effective_from: DateTime<Utc>,
        holidays: Option<&dyn HolidayCalendar>,
    ) -> Result<Option<RecurringSeries>> {
        let mut previous = self.clone();
        match self.pattern.count_limit() {
            Some(count) => {
                let limit = count as usize;
                let kept = expander::generate_capped(
                    self,
                    self.start_time,
                    effective_from,
                    limit,
                    limit,
                    holidays,
                )?
                .len();
                if kept == 0 {
                    return Ok(None);
                }
                previous.pattern.end_count = Some(kept as u32);
            }
            None => {
                let first =
                    expander::generate(self, self.start_time, effective_from, 1, holidays)?;
                if first.is_empty() {
                    return Ok(None);
                }
                let cut = (effective_from - Duration::seconds(1))
                    .max(self.start_time + Duration::seconds(1));
                let end = self.pattern.date_limit().map_or(cut, |end| end.min(cut));
                previous.pattern.end_condition = EndCondition::Date;
                previous.pattern.end_date = Some(end);
            }
        }
        Ok(Some(previous))
    }
}

/// Result of [`RecurringSeries::edit_pattern`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEdit {
    /// The truncated original series; `None` when the edit replaced it entirely
    /// or nothing of it remains before the edit point.
    pub previous: Option<RecurringSeries>,
    pub current: RecurringSeries,
    /// Reservations of the original series from the edit point on that were
    /// cancelled because the new pattern replaces them.
    pub cancelled_reservations: usize,
}

/// Occurrence counts of a series over a window, by original start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    /// Every generated occurrence, cancelled ones included.
    pub total_occurrences: usize,
    pub cancelled_occurrences: usize,
    /// Modified or moved.
    pub modified_occurrences: usize,
    /// Occurrences on a holiday of the series' region.
    pub holiday_occurrences: usize,
    /// First non-cancelled occurrence after "now", at its final position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_occurrence: Option<DateTime<Utc>>,
}

/// A lifecycle operation applied to a series and its materialized reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    Pause,
    Resume,
    /// Cancel reservations from `from` on; without `from`, soft-delete the
    /// whole series.
    Cancel {
        #[serde(default)]
        from: Option<DateTime<Utc>>,
    },
}

/// What a batch operation actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub series_changed: bool,
    pub reservations_affected: usize,
}

impl BatchOutcome {
    /// Total number of records changed.
    pub fn affected(&self) -> usize {
        self.reservations_affected + usize::from(self.series_changed)
    }
}

/// Apply `op` to `series` and the reservations materialized from it.
///
/// Reservations of other series are left alone. Running the same operation
/// twice changes nothing the second time and reports zero.
pub fn apply_batch(
    series: &mut RecurringSeries,
    reservations: &mut [Reservation],
    op: BatchOperation,
) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    match op {
        BatchOperation::Pause => match series.status {
            SeriesStatus::Active => {
                series.status = SeriesStatus::Paused;
                outcome.series_changed = true;
            }
            SeriesStatus::Paused => {}
            SeriesStatus::Cancelled => {
                return Err(EngineError::InvalidOperation(format!(
                    "series {} is cancelled and cannot be paused",
                    series.id
                )))
            }
        },
        BatchOperation::Resume => match series.status {
            SeriesStatus::Paused => {
                series.status = SeriesStatus::Active;
                outcome.series_changed = true;
            }
            SeriesStatus::Active => {}
            SeriesStatus::Cancelled => {
                return Err(EngineError::InvalidOperation(format!(
                    "series {} is cancelled and cannot be resumed",
                    series.id
                )))
            }
        },
        BatchOperation::Cancel { from } => {
            if from.is_none() && series.status != SeriesStatus::Cancelled {
                series.status = SeriesStatus::Cancelled;
                outcome.series_changed = true;
            }
            for reservation in reservations.iter_mut() {
                let owned = reservation.series_id.as_deref() == Some(series.id.as_str());
                let in_range = from.is_none_or(|from| reservation.start_time >= from);
                if owned && in_range && reservation.is_active() {
                    reservation.status = ReservationStatus::Canceled;
                    outcome.reservations_affected += 1;
                }
            }
        }
    }

    debug!(
        series_id = %series.id,
        ?op,
        series_changed = outcome.series_changed,
        reservations = outcome.reservations_affected,
        "applied batch operation"
    );
    Ok(outcome)
}
