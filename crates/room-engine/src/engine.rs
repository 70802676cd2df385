//! The `Scheduler`: engine operations addressed by identity.
//!
//! Wires the collaborator traits to the pure components. Missing identities
//! (room, series) are `NotFound` errors; a failing optional collaborator
//! (holidays, preferences) only degrades the answer.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::availability::{self, room_timezone, RoomAvailability};
use crate::config::EngineConfig;
use crate::conflict::{self, ConflictOptions, ConflictReport, RuleViolation};
use crate::dst::{parse_tz, resolve_local, DstPolicy};
use crate::error::{EngineError, Result};
use crate::exceptions::{minute_key, ExceptionSet, ExceptionType};
use crate::expander::{self, Occurrence};
use crate::freebusy::AvailabilitySlot;
use crate::holiday::HolidayCalendar;
use crate::interval::Interval;
use crate::pattern::{self, ValidationReport};
use crate::room::Room;
use crate::series::{RecurringSeries, SeriesStatistics, SeriesStatus};
use crate::store::{InMemoryStore, PreferenceStore, ReservationStore, RoomCatalog, SeriesStore};
use crate::suggest::{self, Algorithm, RoomSignals, Suggestion, SuggestionRequest, UserPreferences};

pub struct Scheduler<'a> {
    rooms: &'a dyn RoomCatalog,
    reservations: &'a dyn ReservationStore,
    series: &'a dyn SeriesStore,
    holidays: Option<&'a dyn HolidayCalendar>,
    preferences: Option<&'a dyn PreferenceStore>,
    config: EngineConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        rooms: &'a dyn RoomCatalog,
        reservations: &'a dyn ReservationStore,
        series: &'a dyn SeriesStore,
        config: EngineConfig,
    ) -> Self {
        Self {
            rooms,
            reservations,
            series,
            holidays: None,
            preferences: None,
            config,
        }
    }

    /// Use one in-memory store for every collaborator.
    pub fn from_store(store: &'a InMemoryStore, config: EngineConfig) -> Self {
        Self::new(store, store, store, config)
            .with_holidays(store)
            .with_preferences(store)
    }

    pub fn with_holidays(mut self, holidays: &'a dyn HolidayCalendar) -> Self {
        self.holidays = Some(holidays);
        self
    }

    pub fn with_preferences(mut self, preferences: &'a dyn PreferenceStore) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn room(&self, id: &str) -> Result<Room> {
        self.rooms
            .room(id)?
            .ok_or_else(|| EngineError::not_found("room", id))
    }

    fn load_series(&self, id: &str) -> Result<RecurringSeries> {
        self.series
            .series(id)?
            .ok_or_else(|| EngineError::not_found("series", id))
    }

    /// Run the pattern validator on a stored series.
    pub fn validate_pattern(&self, series_id: &str) -> Result<ValidationReport> {
        let series = self.load_series(series_id)?;
        Ok(pattern::validate(&series.pattern, series.start_time))
    }

    /// Effective occurrences of a series starting in the window: generated,
    /// then overlaid with the series' exceptions. A cancelled series has none.
    ///
    /// The window applies to final positions, so an occurrence moved into
    /// the window is returned and one moved out of it is not.
    pub fn occurrences(
        &self,
        series_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        max_occurrences: Option<usize>,
    ) -> Result<Vec<Occurrence>> {
        Interval::new(window_start, window_end)?;
        let series = self.load_series(series_id)?;
        self.effective_occurrences(&series, window_start, window_end, max_occurrences)
    }

    fn effective_occurrences(
        &self,
        series: &RecurringSeries,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        max_occurrences: Option<usize>,
    ) -> Result<Vec<Occurrence>> {
        if series.status == SeriesStatus::Cancelled {
            return Ok(Vec::new());
        }

        let cap = self.config.safety_cap;
        let limit = max_occurrences.map_or(cap, |max| max.min(cap));
        let in_window = |t: DateTime<Utc>| t >= window_start && t < window_end;

        let mut generated =
            expander::generate_capped(series, window_start, window_end, cap, cap, self.holidays)?;

        let stored = self.series.exceptions(&series.id)?;
        for exception in &stored {
            let original = minute_key(exception.original_start_time);
            let moved_in = exception.new_start_time.is_some_and(in_window);
            if !moved_in || in_window(original) {
                continue;
            }
            let found = expander::generate_capped(
                series,
                original,
                original + Duration::minutes(1),
                1,
                1,
                self.holidays,
            )?;
            debug!(series_id = %series.id, %original, found = found.len(), "occurrence moved into window");
            generated.extend(found);
        }

        let exceptions = ExceptionSet::from_exceptions(series.id.clone(), stored)?;
        let mut effective = exceptions.apply(generated);
        effective.retain(|o| in_window(o.start));
        effective.truncate(limit);
        Ok(effective)
    }

    /// Occurrence counts of a series whose original start falls in the window.
    ///
    /// `next_occurrence` is the earliest non-cancelled occurrence starting
    /// after `now`; only an active series has one.
    pub fn series_statistics(
        &self,
        series_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<SeriesStatistics> {
        Interval::new(window_start, window_end)?;
        let series = self.load_series(series_id)?;
        let tz = parse_tz(&series.timezone)?;

        let cap = self.config.safety_cap;
        let generated =
            expander::generate_capped(&series, window_start, window_end, cap, cap, self.holidays)?;
        let exceptions =
            ExceptionSet::from_exceptions(series.id.clone(), self.series.exceptions(&series.id)?)?;
        let holidays = expander::region_holidays(&series, window_start, window_end, self.holidays);

        let mut stats = SeriesStatistics {
            total_occurrences: generated.len(),
            ..SeriesStatistics::default()
        };
        for occurrence in &generated {
            match exceptions
                .get(occurrence.original_start)
                .map(|e| e.exception_type)
            {
                Some(ExceptionType::Cancelled) => stats.cancelled_occurrences += 1,
                Some(ExceptionType::Modified | ExceptionType::Moved) => {
                    stats.modified_occurrences += 1
                }
                None => {}
            }
            if holidays.contains(&occurrence.start.with_timezone(&tz).date_naive()) {
                stats.holiday_occurrences += 1;
            }
        }

        if series.status == SeriesStatus::Active {
            stats.next_occurrence = exceptions
                .apply(generated)
                .into_iter()
                .map(|o| o.start)
                .filter(|start| *start > now)
                .min();
        }
        Ok(stats)
    }

    /// Occurrences that may be turned into reservations at `now`.
    ///
    /// Only an active series materializes, and never past its
    /// `max_booking_ahead_days` horizon.
    pub fn materializable_occurrences(
        &self,
        series_id: &str,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>> {
        Interval::new(window_start, window_end)?;
        let series = self.load_series(series_id)?;
        if series.status != SeriesStatus::Active {
            return Ok(Vec::new());
        }

        let window_end = series
            .booking_horizon(now)
            .map_or(window_end, |horizon| window_end.min(horizon));
        if window_end <= window_start {
            return Ok(Vec::new());
        }

        self.effective_occurrences(&series, window_start, window_end, None)
    }

    /// Check one-off candidate intervals against a room.
    pub fn check_conflict(
        &self,
        room_id: &str,
        candidates: &[Interval],
        exclude_reservation_id: Option<&str>,
    ) -> Result<ConflictReport> {
        let options = ConflictOptions {
            exclude_reservation_id,
            ..ConflictOptions::default()
        };
        self.check_booking(room_id, candidates, &options)
    }

    /// Check one-off candidates with full options: head count, required
    /// equipment, buffer and exclusions.
    pub fn check_booking(
        &self,
        room_id: &str,
        candidates: &[Interval],
        options: &ConflictOptions<'_>,
    ) -> Result<ConflictReport> {
        let room = self.room(room_id)?;
        self.check_candidates(&room, candidates, options)
    }

    /// Check every effective occurrence of a series in the window against its room.
    ///
    /// Occurrences are padded by the series' buffer; the series' own
    /// reservations are ignored. When the pattern names a holiday region but
    /// does not skip holidays, occurrences on a holiday are reported as
    /// violations.
    pub fn check_series_conflict(
        &self,
        series_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<ConflictReport> {
        Interval::new(window_start, window_end)?;
        let series = self.load_series(series_id)?;
        let room = self.room(&series.room_id)?;

        let candidates: Vec<Interval> = self
            .effective_occurrences(&series, window_start, window_end, None)?
            .iter()
            .map(Occurrence::interval)
            .collect();

        let options = ConflictOptions {
            exclude_series_id: Some(series.id.as_str()),
            buffer_minutes: series.buffer_minutes,
            ..ConflictOptions::default()
        };
        let mut report = self.check_candidates(&room, &candidates, &options)?;

        if !series.pattern.skip_holidays {
            let tz = parse_tz(&series.timezone)?;
            let holidays =
                expander::region_holidays(&series, window_start, window_end, self.holidays);
            for candidate in &candidates {
                let date = candidate.start.with_timezone(&tz).date_naive();
                if holidays.contains(&date) {
                    report.add_violation(RuleViolation::holiday(*candidate, date));
                }
            }
        }
        Ok(report)
    }

    fn check_candidates(
        &self,
        room: &Room,
        candidates: &[Interval],
        options: &ConflictOptions<'_>,
    ) -> Result<ConflictReport> {
        for candidate in candidates {
            Interval::new(candidate.start, candidate.end)?;
        }
        let (Some(first), Some(last)) = (
            candidates.iter().map(|c| c.start).min(),
            candidates.iter().map(|c| c.end).max(),
        ) else {
            return Ok(ConflictReport::default());
        };

        // Alternatives are same-day, so fetch whole days around the candidates.
        let margin = Duration::days(1) + Duration::minutes(i64::from(options.buffer_minutes));
        let reservations =
            self.reservations
                .reservations_for_room(&room.id, first - margin, last + margin)?;

        conflict::check_conflict(room, candidates, &reservations, options, &self.config)
    }

    /// Free slots of a room in the window.
    pub fn availability(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<RoomAvailability> {
        Interval::new(window_start, window_end)?;
        let room = self.room(room_id)?;
        let reservations = self
            .reservations
            .reservations_for_room(room_id, window_start, window_end)?;
        availability::calculate_availability(
            &room,
            &reservations,
            window_start,
            window_end,
            &self.config,
        )
    }

    /// First free slot of at least `min_minutes` in the window.
    pub fn find_first_free_slot(
        &self,
        room_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        min_minutes: i64,
    ) -> Result<Option<AvailabilitySlot>> {
        let availability = self.availability(room_id, window_start, window_end)?;
        Ok(availability
            .slots
            .into_iter()
            .find(|slot| slot.duration_minutes >= min_minutes))
    }

    /// Ranked slots for `user_id` on the local day `date`.
    ///
    /// An empty `room_ids` means every room in the catalog. Preferences and
    /// usage history are optional; without them the ranker scores on room
    /// facts alone.
    pub fn suggest(
        &self,
        user_id: &str,
        date: NaiveDate,
        room_ids: &[String],
        algorithms: &[Algorithm],
        max_results: usize,
    ) -> Result<Vec<Suggestion>> {
        let rooms = if room_ids.is_empty() {
            self.rooms.rooms()?
        } else {
            room_ids
                .iter()
                .map(|id| self.room(id))
                .collect::<Result<Vec<_>>>()?
        };

        let preferences = self.user_preferences(user_id);

        let mut signals = Vec::with_capacity(rooms.len());
        for room in rooms {
            let (day_start, day_end) = self.local_day(&room, date)?;
            let availability = self.availability(&room.id, day_start, day_end)?;
            let completed_reservations = self.completed_reservations(user_id, &room.id);
            signals.push(RoomSignals {
                room,
                availability,
                completed_reservations,
            });
        }

        let request = SuggestionRequest {
            date,
            preferences,
            algorithms: algorithms.to_vec(),
            max_results,
        };
        suggest::suggest(&signals, &request, &self.config)
    }

    fn local_day(&self, room: &Room, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let tz = room_timezone(room, &self.config)?;
        let pin = |day: NaiveDate| {
            resolve_local(tz, day.and_time(NaiveTime::MIN), DstPolicy::ShiftForward)
                .ok_or_else(|| EngineError::InvalidTimezone(tz.name().to_string()))
        };
        Ok((pin(date)?, pin(date + Duration::days(1))?))
    }

    fn user_preferences(&self, user_id: &str) -> UserPreferences {
        let Some(store) = self.preferences else {
            return UserPreferences::default();
        };
        match store.preferences(user_id) {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                warn!(user_id, error = %e, "preference store unavailable, using defaults");
                UserPreferences::default()
            }
        }
    }

    fn completed_reservations(&self, user_id: &str, room_id: &str) -> u32 {
        let Some(store) = self.preferences else {
            return 0;
        };
        store
            .completed_reservations(user_id, room_id)
            .unwrap_or_else(|e| {
                warn!(user_id, room_id, error = %e, "usage history unavailable");
                0
            })
    }
}
