//! Room availability: effective opening hours net of existing bookings.
//!
//! For every local day the query window touches, the room's effective daily
//! time range is pinned to instants in the room's timezone and intersected
//! with the window. Each resulting bound is then swept against the room's
//! non-canceled reservations (see [`freebusy::find_free_slots`]).
//!
//! The effective time range comes from an ordered resolver: a booking-rule
//! `allowed_time_range` beats `operating_hours`, which beats the configured
//! default, which beats the full day. A narrower source is never replaced by
//! a wider one, so a 09:00–18:00 room never reports slots at 02:00.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dst::{parse_tz, resolve_local, DstPolicy};
use crate::error::Result;
use crate::freebusy::{self, AvailabilitySlot};
use crate::interval::Interval;
use crate::reservation::{active_for_room, Reservation};
use crate::room::{Room, RoomStatus, TimeRange};

/// Where a room's effective daily time range came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRangeSource {
    BookingRule,
    OperatingHours,
    ConfiguredDefault,
    FullDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTimeRange {
    pub range: TimeRange,
    pub source: TimeRangeSource,
}

/// Pick the room's effective daily time range, first present source wins.
pub fn resolve_time_range(room: &Room, default_hours: Option<TimeRange>) -> ResolvedTimeRange {
    let sources = [
        (TimeRangeSource::BookingRule, room.allowed_time_range),
        (TimeRangeSource::OperatingHours, room.operating_hours),
        (TimeRangeSource::ConfiguredDefault, default_hours),
    ];

    sources
        .into_iter()
        .find_map(|(source, range)| range.map(|range| ResolvedTimeRange { range, source }))
        .unwrap_or(ResolvedTimeRange {
            range: TimeRange::FULL_DAY,
            source: TimeRangeSource::FullDay,
        })
}

/// Free time for one room over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAvailability {
    pub room_id: String,
    pub status: RoomStatus,
    /// False when the room's status rules out booking; `slots` is then empty.
    pub bookable: bool,
    pub time_range: TimeRange,
    pub time_range_source: TimeRangeSource,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Ordered, non-overlapping free slots.
    pub slots: Vec<AvailabilitySlot>,
}

impl RoomAvailability {
    /// Whether `interval` lies entirely inside one reported slot.
    pub fn is_free(&self, interval: &Interval) -> bool {
        self.slots.iter().any(|s| s.interval().contains(interval))
    }
}

/// Timezone the room's hours are written in.
pub fn room_timezone(room: &Room, config: &EngineConfig) -> Result<Tz> {
    parse_tz(room.timezone.as_deref().unwrap_or(&config.default_timezone))
}

/// The room's open interval on a local `date`, or `None` if it cannot be pinned.
pub fn day_bound(range: TimeRange, tz: Tz, date: NaiveDate) -> Option<Interval> {
    let open = resolve_local(tz, range.opens_on(date), DstPolicy::ShiftForward)?;
    let close = resolve_local(tz, range.closes_on(date), DstPolicy::ShiftForward)?;
    (open < close).then_some(Interval {
        start: open,
        end: close,
    })
}

/// Per-day open intervals of `room` intersected with the window, in order.
pub fn daily_bounds(
    room: &Room,
    config: &EngineConfig,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<Interval>> {
    let window = Interval::new(window_start, window_end)?;
    let tz = room_timezone(room, config)?;
    let range = resolve_time_range(room, config.default_operating_hours).range;

    let first = window_start.with_timezone(&tz).date_naive();
    let last = window_end.with_timezone(&tz).date_naive();

    Ok(first
        .iter_days()
        .take_while(|date| *date <= last)
        .filter_map(|date| day_bound(range, tz, date))
        .filter_map(|bound| bound.clip(&window))
        .collect())
}

/// Compute free slots for `room` in `[window_start, window_end)`.
///
/// `reservations` may contain other rooms and canceled bookings; both are
/// ignored. A room that is not `AVAILABLE` is returned with `bookable: false`
/// and no slots.
///
/// # Errors
/// `EngineError::InvalidInterval` when the window is empty,
/// `EngineError::InvalidTimezone` when the room's timezone is unknown.
pub fn calculate_availability(
    room: &Room,
    reservations: &[Reservation],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<RoomAvailability> {
    Interval::new(window_start, window_end)?;
    let resolved = resolve_time_range(room, config.default_operating_hours);

    let mut availability = RoomAvailability {
        room_id: room.id.clone(),
        status: room.status,
        bookable: room.is_bookable(),
        time_range: resolved.range,
        time_range_source: resolved.source,
        window_start,
        window_end,
        slots: Vec::new(),
    };

    if !availability.bookable {
        debug!(room_id = %room.id, status = ?room.status, "room not bookable, no slots");
        return Ok(availability);
    }

    let busy: Vec<Interval> = active_for_room(reservations, &room.id)
        .into_iter()
        .map(Reservation::interval)
        .collect();

    for bound in daily_bounds(room, config, window_start, window_end)? {
        availability.slots.extend(freebusy::find_free_slots(
            &busy,
            bound.start,
            bound.end,
            config.min_slot_minutes,
        ));
    }

    Ok(availability)
}
