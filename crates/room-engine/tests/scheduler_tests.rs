//! The `Scheduler` façade over the in-memory store, and the store's write path.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use room_engine::conflict::{ConflictOptions, ViolationKind};
use room_engine::exceptions::{Exception, ExceptionType};
use room_engine::holiday::StaticHolidayCalendar;
use room_engine::pattern::{DayCode, RecurrencePattern};
use room_engine::reservation::{Reservation, ReservationStatus};
use room_engine::room::{Room, TimeRange};
use room_engine::series::{BatchOperation, RecurringSeries};
use room_engine::store::{
    InMemoryStore, PreferenceStore, ReservationStore, RoomCatalog, SeriesStore, Snapshot,
};
use room_engine::suggest::{Algorithm, TimeOfDay, UserPreferences};
use room_engine::{EngineConfig, EngineError, Interval, Result, Scheduler};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn iv(start: &str, end: &str) -> Interval {
    Interval::new(utc(start), utc(end)).unwrap()
}

fn mwf_series() -> RecurringSeries {
    RecurringSeries::new(
        "s1",
        "room-a",
        "alice",
        RecurrencePattern::weekly(1, &[DayCode::Mo, DayCode::We, DayCode::Fr]).times(6),
        utc("2025-01-06T09:00:00Z"),
        utc("2025-01-06T10:00:00Z"),
        "UTC",
    )
}

fn store() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store.insert_room(
        Room::new("room-a", 8)
            .with_operating_hours(TimeRange::BUSINESS_HOURS)
            .with_equipment(["projector"]),
    );
    store.insert_room(Room::new("room-b", 2).with_location("North Wing"));
    store.insert_series(mwf_series()).unwrap();
    store
}

fn occurrence_days(scheduler: &Scheduler<'_>, series_id: &str) -> Vec<u32> {
    scheduler
        .occurrences(
            series_id,
            utc("2025-01-01T00:00:00Z"),
            utc("2025-03-01T00:00:00Z"),
            None,
        )
        .unwrap()
        .iter()
        .map(|o| o.start.day())
        .collect()
}

struct BrokenPreferences;

impl PreferenceStore for BrokenPreferences {
    fn preferences(&self, _user_id: &str) -> Result<Option<UserPreferences>> {
        Err(EngineError::Collaborator("preferences offline".into()))
    }

    fn completed_reservations(&self, _user_id: &str, _room_id: &str) -> Result<u32> {
        Err(EngineError::Collaborator("history offline".into()))
    }
}

// ── Occurrences ─────────────────────────────────────────────────────────────

#[test]
fn occurrences_overlay_stored_exceptions() {
    let mut store = store();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let generated = scheduler
        .occurrences("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"), None)
        .unwrap();
    assert_eq!(generated.len(), 6);

    store
        .upsert_exception(Exception::cancel("s1", &generated[1]))
        .unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    assert_eq!(occurrence_days(&scheduler, "s1"), vec![6, 10, 13, 15, 17]);
}

#[test]
fn moved_occurrence_follows_its_new_time() {
    let mut store = store();
    store
        .commit_reservation(Reservation::new(
            "bob-1415",
            "room-a",
            "bob",
            utc("2025-01-15T14:00:00Z"),
            utc("2025-01-15T15:00:00Z"),
        ))
        .unwrap();
    let monday = Scheduler::from_store(&store, EngineConfig::default())
        .occurrences("s1", utc("2025-01-13T00:00:00Z"), utc("2025-01-14T00:00:00Z"), None)
        .unwrap()
        .remove(0);
    store
        .upsert_exception(
            Exception::reschedule("s1", &monday, utc("2025-01-15T14:00:00Z"), utc("2025-01-15T15:00:00Z"))
                .with_type(ExceptionType::Moved),
        )
        .unwrap();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());

    let wednesday = scheduler
        .occurrences("s1", utc("2025-01-15T00:00:00Z"), utc("2025-01-16T00:00:00Z"), None)
        .unwrap();
    let starts: Vec<DateTime<Utc>> = wednesday.iter().map(|o| o.start).collect();
    assert_eq!(starts, vec![utc("2025-01-15T09:00:00Z"), utc("2025-01-15T14:00:00Z")]);
    assert_eq!(wednesday[1].original_start, utc("2025-01-13T09:00:00Z"));
    assert_eq!(wednesday[1].exception, Some(ExceptionType::Moved));

    assert!(scheduler
        .occurrences("s1", utc("2025-01-13T00:00:00Z"), utc("2025-01-14T00:00:00Z"), None)
        .unwrap()
        .is_empty());

    let report = scheduler
        .check_series_conflict("s1", utc("2025-01-15T00:00:00Z"), utc("2025-01-16T00:00:00Z"))
        .unwrap();
    assert!(report.has_conflict);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].reservation_id, "bob-1415");
    assert_eq!(report.conflicts[0].candidate, iv("2025-01-15T14:00:00Z", "2025-01-15T15:00:00Z"));
}

#[test]
fn max_applies_after_moves() {
    let mut store = store();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let first = scheduler
        .occurrences("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"), Some(1))
        .unwrap()
        .remove(0);
    store
        .upsert_exception(Exception::reschedule(
            "s1",
            &first,
            utc("2025-03-03T09:00:00Z"),
            utc("2025-03-03T10:00:00Z"),
        ))
        .unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let two = scheduler
        .occurrences("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"), Some(2))
        .unwrap();
    let days: Vec<u32> = two.iter().map(|o| o.start.day()).collect();
    assert_eq!(days, vec![8, 10]);
}

#[test]
fn removed_exception_restores_the_occurrence() {
    let mut store = store();
    let generated = Scheduler::from_store(&store, EngineConfig::default())
        .occurrences("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"), None)
        .unwrap();
    store.upsert_exception(Exception::cancel("s1", &generated[1])).unwrap();
    store.upsert_exception(Exception::cancel("s1", &generated[2])).unwrap();

    // Seconds are ignored when matching the occurrence.
    let removed = store
        .remove_exception("s1", utc("2025-01-08T09:00:30Z"))
        .unwrap();
    assert_eq!(removed.original_start_time, utc("2025-01-08T09:00:00Z"));

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    assert_eq!(occurrence_days(&scheduler, "s1"), vec![6, 8, 13, 15, 17]);
    assert_eq!(store.exceptions("s1").unwrap().len(), 1);

    assert!(matches!(
        store.remove_exception("s1", utc("2025-01-08T09:00:00Z")),
        Err(EngineError::NotFound { kind: "exception", .. })
    ));
    assert!(matches!(
        store.remove_exception("ghost", utc("2025-01-08T09:00:00Z")),
        Err(EngineError::NotFound { kind: "series", .. })
    ));
}

#[test]
fn statistics_count_exceptions_holidays_and_next_occurrence() {
    let mut store = store();
    let mut series = mwf_series();
    series.pattern.holiday_region = Some("DE".to_string());
    store.insert_series(series).unwrap();
    store.set_holidays(
        StaticHolidayCalendar::new().with_holidays("DE", [NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()]),
    );
    let generated = Scheduler::from_store(&store, EngineConfig::default())
        .occurrences("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"), None)
        .unwrap();
    store.upsert_exception(Exception::cancel("s1", &generated[1])).unwrap();
    store
        .upsert_exception(Exception::reschedule(
            "s1",
            &generated[2],
            utc("2025-01-10T14:00:00Z"),
            utc("2025-01-10T15:00:00Z"),
        ))
        .unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let stats = scheduler
        .series_statistics(
            "s1",
            utc("2025-01-01T00:00:00Z"),
            utc("2025-03-01T00:00:00Z"),
            utc("2025-01-07T00:00:00Z"),
        )
        .unwrap();

    assert_eq!(stats.total_occurrences, 6);
    assert_eq!(stats.cancelled_occurrences, 1);
    assert_eq!(stats.modified_occurrences, 1);
    assert_eq!(stats.holiday_occurrences, 1);
    // 01-08 is cancelled; 01-10 moved to the afternoon.
    assert_eq!(stats.next_occurrence, Some(utc("2025-01-10T14:00:00Z")));

    store.apply_batch("s1", BatchOperation::Pause).unwrap();
    let paused = Scheduler::from_store(&store, EngineConfig::default())
        .series_statistics(
            "s1",
            utc("2025-01-01T00:00:00Z"),
            utc("2025-03-01T00:00:00Z"),
            utc("2025-01-07T00:00:00Z"),
        )
        .unwrap();
    assert_eq!(paused.total_occurrences, 6);
    assert_eq!(paused.next_occurrence, None);
}

#[test]
fn stored_holidays_are_skipped() {
    let mut store = store();
    let mut series = mwf_series();
    series.pattern = series.pattern.skipping_holidays("DE");
    store.insert_series(series).unwrap();
    store.set_holidays(
        StaticHolidayCalendar::new().with_holidays("DE", [NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()]),
    );

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    assert_eq!(occurrence_days(&scheduler, "s1"), vec![6, 8, 13, 15, 17, 20]);
}

#[test]
fn cancelled_series_has_no_occurrences() {
    let mut store = store();
    store.apply_batch("s1", BatchOperation::Cancel { from: None }).unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    assert!(occurrence_days(&scheduler, "s1").is_empty());
}

#[test]
fn config_safety_cap_applies() {
    let mut store = store();
    let mut series = mwf_series();
    series.pattern = RecurrencePattern::daily(1);
    store.insert_series(series).unwrap();
    let config = EngineConfig {
        safety_cap: 10,
        ..EngineConfig::default()
    };

    let scheduler = Scheduler::from_store(&store, config);
    assert_eq!(occurrence_days(&scheduler, "s1").len(), 10);
}

#[test]
fn materializable_occurrences_respect_horizon_and_status() {
    let mut store = store();
    store.insert_series(mwf_series().with_max_booking_ahead(7)).unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let now = utc("2025-01-05T12:00:00Z");
    let ready = scheduler
        .materializable_occurrences("s1", now, utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"))
        .unwrap();
    let days: Vec<u32> = ready.iter().map(|o| o.start.day()).collect();
    assert_eq!(days, vec![6, 8, 10]);

    store.apply_batch("s1", BatchOperation::Pause).unwrap();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    assert!(scheduler
        .materializable_occurrences("s1", now, utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"))
        .unwrap()
        .is_empty());
}

#[test]
fn validate_pattern_reports_on_stored_series() {
    let store = store();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());

    assert!(scheduler.validate_pattern("s1").unwrap().is_valid);
}

// ── Identity errors ─────────────────────────────────────────────────────────

#[test]
fn missing_identities_are_not_found() {
    let store = store();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let (from, to) = (utc("2025-01-01T00:00:00Z"), utc("2025-01-02T00:00:00Z"));

    assert!(matches!(
        scheduler.occurrences("nope", from, to, None),
        Err(EngineError::NotFound { kind: "series", .. })
    ));
    assert!(matches!(
        scheduler.availability("nope", from, to),
        Err(EngineError::NotFound { kind: "room", .. })
    ));
    assert!(matches!(
        scheduler.check_conflict("nope", &[iv("2025-01-01T09:00:00Z", "2025-01-01T10:00:00Z")], None),
        Err(EngineError::NotFound { kind: "room", .. })
    ));
    assert!(matches!(
        scheduler.suggest("alice", from.date_naive(), &["nope".to_string()], &[], 5),
        Err(EngineError::NotFound { kind: "room", .. })
    ));
}

// ── Conflicts ───────────────────────────────────────────────────────────────

#[test]
fn one_off_check_uses_stored_reservations() {
    let mut store = store();
    store
        .commit_reservation(Reservation::new(
            "r1",
            "room-a",
            "bob",
            utc("2025-01-06T10:00:00Z"),
            utc("2025-01-06T11:00:00Z"),
        ))
        .unwrap();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());

    let report = scheduler
        .check_conflict("room-a", &[iv("2025-01-06T10:30:00Z", "2025-01-06T11:30:00Z")], None)
        .unwrap();
    assert!(report.has_conflict);
    assert_eq!(report.suggestions.len(), 2);

    let rescheduling = scheduler
        .check_conflict(
            "room-a",
            &[iv("2025-01-06T10:30:00Z", "2025-01-06T11:30:00Z")],
            Some("r1"),
        )
        .unwrap();
    assert!(!rescheduling.has_conflict);
}

#[test]
fn series_check_pads_occurrences_and_skips_own_bookings() {
    let mut store = store();
    store.insert_series(mwf_series().with_buffer(15)).unwrap();
    // Own materialized occurrence: never a conflict.
    store
        .commit_reservation(
            Reservation::new("own", "room-a", "alice", utc("2025-01-06T09:00:00Z"), utc("2025-01-06T10:00:00Z"))
                .with_series("s1"),
        )
        .unwrap();
    // Starts right after the 01-08 occurrence, inside its buffer.
    store
        .commit_reservation(Reservation::new(
            "tight",
            "room-a",
            "bob",
            utc("2025-01-08T10:10:00Z"),
            utc("2025-01-08T11:00:00Z"),
        ))
        .unwrap();
    // Far from every occurrence.
    store
        .commit_reservation(Reservation::new(
            "far",
            "room-a",
            "bob",
            utc("2025-01-10T14:00:00Z"),
            utc("2025-01-10T15:00:00Z"),
        ))
        .unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let report = scheduler
        .check_series_conflict("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"))
        .unwrap();

    assert!(report.has_conflict);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].reservation_id, "tight");
    assert_eq!(
        report.conflicting_candidates(),
        vec![iv("2025-01-08T09:00:00Z", "2025-01-08T10:00:00Z")]
    );
    assert!(!report.suggestions.is_empty());
}

// ── Availability and suggestions ────────────────────────────────────────────

#[test]
fn availability_and_first_free_slot() {
    let mut store = store();
    store
        .commit_reservation(Reservation::new(
            "r1",
            "room-a",
            "bob",
            utc("2025-01-06T09:00:00Z"),
            utc("2025-01-06T09:45:00Z"),
        ))
        .unwrap();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());

    let availability = scheduler
        .availability("room-a", utc("2025-01-06T00:00:00Z"), utc("2025-01-07T00:00:00Z"))
        .unwrap();
    assert_eq!(availability.slots.len(), 1);
    assert_eq!(availability.slots[0].start, utc("2025-01-06T09:45:00Z"));

    let first = scheduler
        .find_first_free_slot("room-a", utc("2025-01-06T00:00:00Z"), utc("2025-01-07T00:00:00Z"), 60)
        .unwrap()
        .unwrap();
    assert_eq!(first.start, utc("2025-01-06T09:45:00Z"));
}

#[test]
fn suggestions_use_stored_preferences_and_history() {
    let mut store = store();
    store.set_preferences(
        "alice",
        UserPreferences {
            preferred_times: vec![TimeOfDay::Morning],
            equipment_requirements: BTreeSet::from(["projector".to_string()]),
            ..UserPreferences::default()
        },
    );
    for (i, day) in [6u32, 7, 8].into_iter().enumerate() {
        let start = utc(&format!("2024-12-{:02}T15:00:00Z", day));
        store
            .commit_reservation(
                Reservation::new(format!("past-{i}"), "room-a", "alice", start, start + chrono::Duration::hours(1))
                    .with_status(ReservationStatus::Completed),
            )
            .unwrap();
    }
    assert_eq!(store.completed_reservations("alice", "room-a").unwrap(), 3);

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let result = scheduler
        .suggest(
            "alice",
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            &[],
            &[Algorithm::TimePreference, Algorithm::EquipmentMatch, Algorithm::UsagePattern],
            3,
        )
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.iter().all(|s| s.room_id == "room-a"));
    assert!(result.iter().all(|s| (8..12).contains(&s.start_time.hour())));
    assert_eq!(result[0].score, 100);
}

#[test]
fn failing_preference_store_degrades() {
    let store = store();
    let scheduler = Scheduler::new(&store, &store, &store, EngineConfig::default())
        .with_preferences(&BrokenPreferences);

    let result = scheduler
        .suggest(
            "alice",
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            &["room-a".to_string()],
            &[],
            5,
        )
        .unwrap();

    assert_eq!(result.len(), 5);
    assert_eq!(result[0].score, 75);
}

// ── Store write path ────────────────────────────────────────────────────────

#[test]
fn write_path_rejects_overlap_but_accepts_back_to_back() {
    let mut store = store();
    let first = Reservation::new("r1", "room-a", "bob", utc("2025-01-06T10:00:00Z"), utc("2025-01-06T11:00:00Z"));
    store.commit_reservation(first.clone()).unwrap();

    let clash = Reservation::new("r2", "room-a", "carol", utc("2025-01-06T10:30:00Z"), utc("2025-01-06T11:30:00Z"));
    let err = store.commit_reservation(clash.clone()).unwrap_err();
    assert!(matches!(err, EngineError::Overlap { ref reservation_id, .. } if reservation_id == "r2"));

    let next = Reservation::new("r3", "room-a", "carol", utc("2025-01-06T11:00:00Z"), utc("2025-01-06T12:00:00Z"));
    store.commit_reservation(next).unwrap();

    // Another room is independent; a canceled booking frees the slot.
    store
        .commit_reservation(Reservation::new("r4", "room-b", "carol", clash.start_time, clash.end_time))
        .unwrap();
    store
        .commit_reservation(first.with_status(ReservationStatus::Canceled))
        .unwrap();
    assert!(store.commit_reservation(clash).is_err(), "r3 still overlaps 11:00-11:30");

    let active = store
        .reservations_for_room("room-a", utc("2025-01-06T00:00:00Z"), utc("2025-01-07T00:00:00Z"))
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[test]
fn write_path_validates_identity_and_interval() {
    let mut store = store();

    let err = store
        .commit_reservation(Reservation::new("r1", "ghost", "bob", utc("2025-01-06T10:00:00Z"), utc("2025-01-06T11:00:00Z")))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "room", .. }));

    let err = store
        .commit_reservation(Reservation::new("r1", "room-a", "bob", utc("2025-01-06T11:00:00Z"), utc("2025-01-06T10:00:00Z")))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInterval { .. }));
}

#[test]
fn batch_through_store_reports_counts() {
    let mut store = store();
    for (id, day) in [("m1", 6u32), ("m2", 8), ("m3", 10)] {
        let start = utc(&format!("2025-01-{:02}T09:00:00Z", day));
        store
            .commit_reservation(
                Reservation::new(id, "room-a", "alice", start, start + chrono::Duration::hours(1)).with_series("s1"),
            )
            .unwrap();
    }

    let outcome = store
        .apply_batch("s1", BatchOperation::Cancel { from: Some(utc("2025-01-07T00:00:00Z")) })
        .unwrap();
    assert_eq!(outcome.reservations_affected, 2);

    let again = store
        .apply_batch("s1", BatchOperation::Cancel { from: Some(utc("2025-01-07T00:00:00Z")) })
        .unwrap();
    assert_eq!(again.affected(), 0);

    assert!(matches!(
        store.apply_batch("ghost", BatchOperation::Pause),
        Err(EngineError::NotFound { kind: "series", .. })
    ));
}

#[test]
fn store_pattern_edit_splits_series() {
    let mut store = store();

    store
        .edit_series_pattern(
            "s1",
            RecurrencePattern::weekly(1, &[DayCode::Mo]),
            utc("2025-01-13T00:00:00Z"),
            "s1-b",
            false,
        )
        .unwrap();

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    assert_eq!(occurrence_days(&scheduler, "s1"), vec![6, 8, 10]);
    let new_days = occurrence_days(&scheduler, "s1-b");
    assert_eq!(new_days.first(), Some(&13));
    assert!(store.series("s1-b").unwrap().is_some());
}

#[test]
fn store_pattern_edit_cancels_superseded_reservations() {
    let mut store = store();
    for (id, day) in [("m-08", 8u32), ("m-15", 15)] {
        let start = utc(&format!("2025-01-{:02}T09:00:00Z", day));
        store
            .commit_reservation(
                Reservation::new(id, "room-a", "alice", start, start + chrono::Duration::hours(1)).with_series("s1"),
            )
            .unwrap();
    }

    let edit = store
        .edit_series_pattern(
            "s1",
            RecurrencePattern::weekly(1, &[DayCode::Mo, DayCode::We]),
            utc("2025-01-13T00:00:00Z"),
            "s1-b",
            false,
        )
        .unwrap();
    assert_eq!(edit.cancelled_reservations, 1);

    let status = |id: &str| {
        store
            .snapshot()
            .reservations
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.status)
    };
    assert_eq!(status("m-08"), Some(ReservationStatus::Confirmed));
    assert_eq!(status("m-15"), Some(ReservationStatus::Canceled));

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let report = scheduler
        .check_series_conflict("s1-b", utc("2025-01-13T00:00:00Z"), utc("2025-01-27T00:00:00Z"))
        .unwrap();
    assert!(!report.has_conflict, "{:?}", report.conflicts);
}

#[test]
fn unskipped_holidays_are_reported_on_series_checks() {
    let mut store = store();
    let mut series = mwf_series();
    series.pattern.holiday_region = Some("DE".to_string());
    store.insert_series(series).unwrap();
    store.set_holidays(
        StaticHolidayCalendar::new().with_holidays("DE", [NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()]),
    );

    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let report = scheduler
        .check_series_conflict("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"))
        .unwrap();
    assert!(report.has_conflict);
    assert!(report.conflicts.is_empty());
    let holidays: Vec<_> = report.violations_of(ViolationKind::Holiday).collect();
    assert_eq!(holidays.len(), 1);
    assert_eq!(holidays[0].candidate, Some(iv("2025-01-13T09:00:00Z", "2025-01-13T10:00:00Z")));

    let mut skipping = mwf_series();
    skipping.pattern = skipping.pattern.skipping_holidays("DE");
    store.insert_series(skipping).unwrap();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let report = scheduler
        .check_series_conflict("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"))
        .unwrap();
    assert!(!report.has_conflict);
}

#[test]
fn booking_check_reports_capacity_and_equipment() {
    let store = store();
    let scheduler = Scheduler::from_store(&store, EngineConfig::default());
    let equipment = ["projector".to_string()];
    let options = ConflictOptions {
        attendees: Some(5),
        required_equipment: &equipment,
        ..ConflictOptions::default()
    };

    let small = scheduler
        .check_booking("room-b", &[iv("2025-01-06T10:00:00Z", "2025-01-06T11:00:00Z")], &options)
        .unwrap();
    let kinds: Vec<ViolationKind> = small.violations.iter().map(|v| v.kind).collect();
    assert_eq!(kinds, vec![ViolationKind::CapacityExceeded, ViolationKind::MissingEquipment]);
    assert!(small.has_conflict);

    let fits = scheduler
        .check_booking("room-a", &[iv("2025-01-06T10:00:00Z", "2025-01-06T11:00:00Z")], &options)
        .unwrap();
    assert!(!fits.has_conflict);
    assert!(fits.violations.is_empty());
}

#[test]
fn exceptions_need_a_known_series() {
    let mut store = store();
    let occurrence = Scheduler::from_store(&store, EngineConfig::default())
        .occurrences("s1", utc("2025-01-01T00:00:00Z"), utc("2025-03-01T00:00:00Z"), Some(1))
        .unwrap()
        .remove(0);

    let err = store
        .upsert_exception(Exception::cancel("ghost", &occurrence))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "series", .. }));
}

#[test]
fn snapshot_loads_from_json() {
    let json = r#"{
        "rooms": [
            {"id": "r", "capacity": 4, "operating_hours": {"start": "08:00", "end": "12:00"}}
        ],
        "series": [],
        "holidays": {"DE": ["2025-12-25"]}
    }"#;

    let store = InMemoryStore::from_snapshot(Snapshot::from_json_str(json).unwrap());

    let room = store.room("r").unwrap().unwrap();
    assert_eq!(room.operating_hours, Some(TimeRange::parse("08:00", "12:00").unwrap()));
    assert_eq!(store.rooms().unwrap().len(), 1);
    assert!(store.snapshot().reservations.is_empty());
    assert_eq!(store.series("anything").unwrap(), None);
}
