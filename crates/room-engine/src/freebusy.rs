//! Compute free time slots from busy intervals.
//!
//! Busy intervals are clipped to a bounding window and merged, then a cursor
//! sweeps forward through the merged list emitting the gaps. A booking
//! swallowed by an earlier, longer one cannot reopen time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// A free time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl AvailabilitySlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// Merge overlapping or adjacent busy periods, clipped to the given window.
///
/// Returns a sorted, non-overlapping list of intervals.
pub fn merge_busy_periods(
    busy: &[Interval],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Interval> {
    // Collect intervals clipped to the window, discarding those entirely outside.
    let mut intervals: Vec<Interval> = busy
        .iter()
        .filter(|b| b.start < window_end && b.end > window_start)
        .map(|b| Interval {
            start: b.start.max(window_start),
            end: b.end.min(window_end),
        })
        .collect();

    if intervals.is_empty() {
        return Vec::new();
    }

    intervals.sort();

    let mut merged: Vec<Interval> = Vec::new();
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start <= last.end {
                last.end = last.end.max(interval.end);
                continue;
            }
        }
        merged.push(interval);
    }

    merged
}

/// Find free slots of at least `min_duration_minutes` within a window.
///
/// Busy intervals may overlap and need not be sorted. Returns slots sorted by
/// start time; gaps shorter than the minimum are dropped.
pub fn find_free_slots(
    busy: &[Interval],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_duration_minutes: i64,
) -> Vec<AvailabilitySlot> {
    let mut free_slots = Vec::new();
    let mut cursor = window_start;

    for busy in merge_busy_periods(busy, window_start, window_end) {
        if cursor < busy.start {
            let slot = AvailabilitySlot::new(cursor, busy.start);
            if slot.duration_minutes >= min_duration_minutes {
                free_slots.push(slot);
            }
        }
        cursor = busy.end;
    }

    // Trailing free slot after the last busy period.
    if cursor < window_end {
        let slot = AvailabilitySlot::new(cursor, window_end);
        if slot.duration_minutes >= min_duration_minutes {
            free_slots.push(slot);
        }
    }

    free_slots
}

/// Find the first free slot of at least `min_duration_minutes` within the window.
pub fn find_first_free_slot(
    busy: &[Interval],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    min_duration_minutes: i64,
) -> Option<AvailabilitySlot> {
    find_free_slots(busy, window_start, window_end, min_duration_minutes)
        .into_iter()
        .next()
}
