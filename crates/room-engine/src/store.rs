//! Collaborator interfaces and an in-memory implementation.
//!
//! The engine never owns persistent state. It reads rooms, reservations,
//! series, exceptions, holidays and user preferences through the traits in
//! this module. [`InMemoryStore`] implements all of them over a
//! [`Snapshot`] and doubles as the reference conflict-safe write path.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::exceptions::{minute_key, Exception, ExceptionSet};
use crate::holiday::{HolidayCalendar, StaticHolidayCalendar};
use crate::interval::Interval;
use crate::pattern::RecurrencePattern;
use crate::reservation::{Reservation, ReservationStatus};
use crate::room::Room;
use crate::series::{self, BatchOperation, BatchOutcome, RecurringSeries, SeriesEdit, SeriesStatus};
use crate::suggest::UserPreferences;

pub trait RoomCatalog {
    fn room(&self, id: &str) -> Result<Option<Room>>;

    fn rooms(&self) -> Result<Vec<Room>>;
}

pub trait ReservationStore {
    /// Non-canceled reservations of `room_id` overlapping the window.
    fn reservations_for_room(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>>;
}

pub trait SeriesStore {
    fn series(&self, id: &str) -> Result<Option<RecurringSeries>>;

    fn exceptions(&self, series_id: &str) -> Result<Vec<Exception>>;
}

/// Read-only user signals for the suggestion ranker.
pub trait PreferenceStore {
    fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;

    /// COMPLETED reservations organized by `user_id` in `room_id`.
    fn completed_reservations(&self, user_id: &str, room_id: &str) -> Result<u32>;
}

/// Everything the engine can read, as one serializable document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub rooms: Vec<Room>,
    pub reservations: Vec<Reservation>,
    pub series: Vec<RecurringSeries>,
    pub exceptions: Vec<Exception>,
    pub holidays: StaticHolidayCalendar,
    pub preferences: BTreeMap<String, UserPreferences>,
}

impl Snapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Collaborator(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Collaborator(e.to_string()))
    }
}

/// A [`Snapshot`] behind the collaborator traits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    snapshot: Snapshot,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot
    }

    pub fn insert_room(&mut self, room: Room) {
        match self.snapshot.rooms.iter_mut().find(|r| r.id == room.id) {
            Some(existing) => *existing = room,
            None => self.snapshot.rooms.push(room),
        }
    }

    /// Add or replace a series after validating it.
    pub fn insert_series(&mut self, series: RecurringSeries) -> Result<()> {
        series.validate()?;
        match self.snapshot.series.iter_mut().find(|s| s.id == series.id) {
            Some(existing) => *existing = series,
            None => self.snapshot.series.push(series),
        }
        Ok(())
    }

    pub fn set_preferences(&mut self, user_id: impl Into<String>, preferences: UserPreferences) {
        self.snapshot.preferences.insert(user_id.into(), preferences);
    }

    pub fn set_holidays(&mut self, holidays: StaticHolidayCalendar) {
        self.snapshot.holidays = holidays;
    }

    /// Record an exception, replacing any previous one for the same occurrence.
    pub fn upsert_exception(&mut self, exception: Exception) -> Result<Option<Exception>> {
        if !self.snapshot.series.iter().any(|s| s.id == exception.series_id) {
            return Err(EngineError::not_found("series", exception.series_id));
        }
        exception.validate()?;

        let key = minute_key(exception.original_start_time);
        let slot = self
            .snapshot
            .exceptions
            .iter_mut()
            .find(|e| e.series_id == exception.series_id && minute_key(e.original_start_time) == key);
        Ok(match slot {
            Some(existing) => Some(std::mem::replace(existing, exception)),
            None => {
                self.snapshot.exceptions.push(exception);
                None
            }
        })
    }

    /// Drop the exception for the occurrence originally starting at
    /// `original_start`, restoring the generated occurrence.
    ///
    /// # Errors
    /// `EngineError::NotFound` when the series or the exception does not exist.
    pub fn remove_exception(
        &mut self,
        series_id: &str,
        original_start: DateTime<Utc>,
    ) -> Result<Exception> {
        if !self.snapshot.series.iter().any(|s| s.id == series_id) {
            return Err(EngineError::not_found("series", series_id));
        }
        let mut set = ExceptionSet::from_exceptions(series_id, self.exceptions(series_id)?)?;
        let removed = set.remove(original_start)?;

        self.snapshot.exceptions.retain(|e| e.series_id != series_id);
        self.snapshot.exceptions.extend(set.to_vec());
        debug!(series_id, %original_start, "removed exception");
        Ok(removed)
    }

    /// Insert or update a reservation, re-checking overlap under `&mut` access.
    ///
    /// # Errors
    /// `EngineError::Overlap` when the reservation is active and overlaps
    /// another active reservation in the same room. Back-to-back bookings are
    /// accepted.
    pub fn commit_reservation(&mut self, reservation: Reservation) -> Result<()> {
        let interval = Interval::new(reservation.start_time, reservation.end_time)?;
        if !self.snapshot.rooms.iter().any(|r| r.id == reservation.room_id) {
            return Err(EngineError::not_found("room", reservation.room_id));
        }

        if reservation.is_active() {
            let clash = self.snapshot.reservations.iter().any(|other| {
                other.id != reservation.id
                    && other.room_id == reservation.room_id
                    && other.is_active()
                    && other.interval().overlaps(&interval)
            });
            if clash {
                return Err(EngineError::Overlap {
                    room_id: reservation.room_id,
                    reservation_id: reservation.id,
                });
            }
        }

        match self
            .snapshot
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation.id)
        {
            Some(existing) => *existing = reservation,
            None => self.snapshot.reservations.push(reservation),
        }
        Ok(())
    }

    /// Run a batch operation against a stored series and its reservations.
    pub fn apply_batch(&mut self, series_id: &str, op: BatchOperation) -> Result<BatchOutcome> {
        let Snapshot {
            series: all_series,
            reservations,
            ..
        } = &mut self.snapshot;
        let target = all_series
            .iter_mut()
            .find(|s| s.id == series_id)
            .ok_or_else(|| EngineError::not_found("series", series_id))?;
        series::apply_batch(target, reservations, op)
    }

    /// Change a stored series' pattern. See [`RecurringSeries::edit_pattern`].
    ///
    /// A split keeps the truncated original under its id and stores the new
    /// series under `new_id`. When nothing of the original remains, it is
    /// marked cancelled. Either way the original's active reservations
    /// starting at or after `effective_from` are cancelled, and their number
    /// is reported in [`SeriesEdit::cancelled_reservations`].
    pub fn edit_series_pattern(
        &mut self,
        series_id: &str,
        pattern: RecurrencePattern,
        effective_from: DateTime<Utc>,
        new_id: &str,
        retroactive: bool,
    ) -> Result<SeriesEdit> {
        let original = self
            .snapshot
            .series
            .iter()
            .find(|s| s.id == series_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("series", series_id))?;

        let mut edit = original.edit_pattern(
            pattern,
            effective_from,
            new_id,
            retroactive,
            Some(&self.snapshot.holidays),
        )?;

        if edit.current.id == original.id {
            self.insert_series(edit.current.clone())?;
        } else {
            let kept = edit.previous.clone().unwrap_or_else(|| {
                let mut cancelled = original.clone();
                cancelled.status = SeriesStatus::Cancelled;
                cancelled
            });
            self.insert_series(kept)?;
            self.insert_series(edit.current.clone())?;
            debug!(series_id, new_id, "stored split series");
        }

        let outcome = self.apply_batch(
            series_id,
            BatchOperation::Cancel {
                from: Some(effective_from),
            },
        )?;
        edit.cancelled_reservations = outcome.reservations_affected;
        Ok(edit)
    }
}

impl RoomCatalog for InMemoryStore {
    fn room(&self, id: &str) -> Result<Option<Room>> {
        Ok(self.snapshot.rooms.iter().find(|r| r.id == id).cloned())
    }

    fn rooms(&self) -> Result<Vec<Room>> {
        Ok(self.snapshot.rooms.clone())
    }
}

impl ReservationStore for InMemoryStore {
    fn reservations_for_room(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        let window = Interval::new(window_start, window_end)?;
        Ok(self
            .snapshot
            .reservations
            .iter()
            .filter(|r| r.room_id == room_id && r.is_active() && r.interval().overlaps(&window))
            .cloned()
            .collect())
    }
}

impl SeriesStore for InMemoryStore {
    fn series(&self, id: &str) -> Result<Option<RecurringSeries>> {
        Ok(self.snapshot.series.iter().find(|s| s.id == id).cloned())
    }

    fn exceptions(&self, series_id: &str) -> Result<Vec<Exception>> {
        Ok(self
            .snapshot
            .exceptions
            .iter()
            .filter(|e| e.series_id == series_id)
            .cloned()
            .collect())
    }
}

impl HolidayCalendar for InMemoryStore {
    fn holidays_between(
        &self,
        region: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        self.snapshot.holidays.holidays_between(region, from, to)
    }
}

impl PreferenceStore for InMemoryStore {
    fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self.snapshot.preferences.get(user_id).cloned())
    }

    fn completed_reservations(&self, user_id: &str, room_id: &str) -> Result<u32> {
        let count = self
            .snapshot
            .reservations
            .iter()
            .filter(|r| {
                r.organizer_id == user_id
                    && r.room_id == room_id
                    && r.status == ReservationStatus::Completed
            })
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
