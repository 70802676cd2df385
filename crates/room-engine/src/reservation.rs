//! Reservations as returned by the reservation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    #[default]
    Confirmed,
    Canceled,
    Completed,
    InProgress,
}

/// A booked interval in a room.
///
/// Among non-canceled reservations of one room no two intervals may overlap;
/// the engine reports violations, the store's write path enforces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub room_id: String,
    pub organizer_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: ReservationStatus,
    /// Owning recurring series, for materialized occurrences.
    #[serde(default)]
    pub series_id: Option<String>,
}

impl Reservation {
    pub fn new(
        id: impl Into<String>,
        room_id: impl Into<String>,
        organizer_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            organizer_id: organizer_id.into(),
            title: None,
            start_time,
            end_time,
            status: ReservationStatus::Confirmed,
            series_id: None,
        }
    }

    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_series(mut self, series_id: impl Into<String>) -> Self {
        self.series_id = Some(series_id.into());
        self
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether this reservation still blocks the room.
    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Canceled
    }
}

/// Non-canceled reservations of `room_id`, sorted by start time.
pub fn active_for_room<'a>(reservations: &'a [Reservation], room_id: &str) -> Vec<&'a Reservation> {
    let mut active: Vec<&Reservation> = reservations
        .iter()
        .filter(|r| r.room_id == room_id && r.is_active())
        .collect();
    active.sort_by_key(|r| (r.start_time, r.end_time));
    active
}
