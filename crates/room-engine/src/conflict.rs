//! Detect overlaps between candidate intervals and a room's bookings.
//!
//! Every candidate is tested against every non-canceled reservation of the
//! room with the strict half-open rule `a.start < b.end && a.end > b.start`.
//! Adjacent bookings (one ends exactly when the other starts) are NOT
//! conflicts; they are reported separately as near misses.
//!
//! Besides overlaps, a check reports rule violations: a room that is not
//! bookable, too many attendees, missing equipment, a candidate outside the
//! room's own hours and, for series, occurrences on a regional holiday.
//!
//! When a booking overlaps, a handful of same-day alternatives of the same
//! length are proposed from the gaps between existing bookings.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::availability::{day_bound, resolve_time_range, room_timezone};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::freebusy;
use crate::interval::Interval;
use crate::reservation::{active_for_room, Reservation};
use crate::room::{Room, TimeRange};

/// How a candidate relates to an existing booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapKind {
    /// The candidate covers the whole booking.
    FullyContains,
    /// The booking covers the whole candidate (also used for identical intervals).
    FullyContainedBy,
    PartialOverlap,
    /// Touching endpoints. Never a conflict.
    Adjacent,
}

/// Classify `candidate` against `existing`; `None` when they neither overlap nor touch.
pub fn classify(candidate: &Interval, existing: &Interval) -> Option<OverlapKind> {
    if candidate.overlaps(existing) {
        Some(if existing.contains(candidate) {
            OverlapKind::FullyContainedBy
        } else if candidate.contains(existing) {
            OverlapKind::FullyContains
        } else {
            OverlapKind::PartialOverlap
        })
    } else if candidate.is_adjacent(existing) {
        Some(OverlapKind::Adjacent)
    } else {
        None
    }
}

/// A candidate interval that overlaps (or touches) a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub candidate: Interval,
    pub reservation_id: String,
    pub existing: Interval,
    pub kind: OverlapKind,
    pub overlap_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The room is in maintenance or otherwise not accepting bookings.
    RoomUnavailable,
    CapacityExceeded,
    MissingEquipment,
    /// The candidate leaves the room's allowed or operating hours.
    OutsideHours,
    /// A series occurrence falls on a holiday its pattern does not skip.
    Holiday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A booking rule broken by a candidate, or by the request as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    /// The offending candidate; `None` when the whole request is affected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Interval>,
    pub message: String,
}

impl RuleViolation {
    pub fn holiday(candidate: Interval, date: NaiveDate) -> Self {
        Self {
            kind: ViolationKind::Holiday,
            severity: Severity::Medium,
            candidate: Some(candidate),
            message: format!("occurrence falls on the holiday {}", date),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Any overlap or rule violation.
    pub has_conflict: bool,
    pub conflicts: Vec<Conflict>,
    /// Bookings that touch a candidate without overlapping it.
    pub near_misses: Vec<Conflict>,
    #[serde(default)]
    pub violations: Vec<RuleViolation>,
    /// Same-day alternatives, best first.
    pub suggestions: Vec<Interval>,
}

impl ConflictReport {
    pub fn add_violation(&mut self, violation: RuleViolation) {
        self.violations.push(violation);
        self.has_conflict = true;
    }

    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &RuleViolation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Distinct candidates that hit at least one booking, in order.
    pub fn conflicting_candidates(&self) -> Vec<Interval> {
        self.conflicts
            .iter()
            .map(|c| c.candidate)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Knobs for a conflict check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConflictOptions<'a> {
    /// Ignore this reservation, typically the one being rescheduled.
    pub exclude_reservation_id: Option<&'a str>,
    /// Ignore reservations materialized from this series.
    pub exclude_series_id: Option<&'a str>,
    /// Gap kept clear on both sides of every candidate.
    pub buffer_minutes: u32,
    /// Expected head count, checked against the room's capacity.
    pub attendees: Option<u32>,
    /// Equipment tags the booking needs.
    pub required_equipment: &'a [String],
}

impl<'a> ConflictOptions<'a> {
    fn ignores(&self, reservation: &Reservation) -> bool {
        self.exclude_reservation_id == Some(reservation.id.as_str())
            || (self.exclude_series_id.is_some()
                && reservation.series_id.as_deref() == self.exclude_series_id)
    }
}

/// Find all conflicts and near misses between `candidates` and the bookings
/// of `room_id`.
///
/// Returns `(conflicts, near_misses)`, each ordered by candidate then booking
/// start. Candidates are padded by the buffer before testing.
///
/// # Errors
/// `EngineError::InvalidInterval` when a candidate has `end <= start`.
pub fn find_conflicts(
    candidates: &[Interval],
    reservations: &[Reservation],
    room_id: &str,
    options: &ConflictOptions<'_>,
) -> Result<(Vec<Conflict>, Vec<Conflict>)> {
    for candidate in candidates {
        Interval::new(candidate.start, candidate.end)?;
    }

    let existing: Vec<&Reservation> = active_for_room(reservations, room_id)
        .into_iter()
        .filter(|r| !options.ignores(r))
        .collect();

    let mut conflicts = Vec::new();
    let mut near_misses = Vec::new();

    for candidate in candidates {
        let tested = candidate.padded(options.buffer_minutes);
        for reservation in &existing {
            let booked = reservation.interval();
            let Some(kind) = classify(&tested, &booked) else {
                continue;
            };
            let conflict = Conflict {
                candidate: *candidate,
                reservation_id: reservation.id.clone(),
                existing: booked,
                kind,
                overlap_minutes: tested.overlap_minutes(&booked),
            };
            if kind == OverlapKind::Adjacent {
                near_misses.push(conflict);
            } else {
                conflicts.push(conflict);
            }
        }
    }

    Ok((conflicts, near_misses))
}

/// Check `candidates` against the room's bookings and rules, and propose
/// alternatives.
///
/// Alternatives are computed only when a booking overlaps, at most
/// `config.max_alternatives` of them.
pub fn check_conflict(
    room: &Room,
    candidates: &[Interval],
    reservations: &[Reservation],
    options: &ConflictOptions<'_>,
    config: &EngineConfig,
) -> Result<ConflictReport> {
    let (conflicts, near_misses) = find_conflicts(candidates, reservations, &room.id, options)?;

    let mut report = ConflictReport {
        has_conflict: !conflicts.is_empty(),
        conflicts,
        near_misses,
        violations: Vec::new(),
        suggestions: Vec::new(),
    };

    for violation in rule_violations(room, candidates, options, config)? {
        report.add_violation(violation);
    }

    if !report.conflicts.is_empty() {
        report.suggestions = suggest_alternatives(room, &report, reservations, options, config)?;
    }

    Ok(report)
}

/// Room status, capacity, equipment and hours rules for a request.
///
/// Hours are only enforced when the room sets its own `allowed_time_range`
/// or `operating_hours`; the engine-wide default does not restrict bookings.
fn rule_violations(
    room: &Room,
    candidates: &[Interval],
    options: &ConflictOptions<'_>,
    config: &EngineConfig,
) -> Result<Vec<RuleViolation>> {
    let mut violations = Vec::new();
    let whole = |kind, severity, message| RuleViolation {
        kind,
        severity,
        candidate: None,
        message,
    };

    if !room.is_bookable() {
        violations.push(whole(
            ViolationKind::RoomUnavailable,
            Severity::High,
            format!("room {} is {:?}", room.id, room.status),
        ));
    }

    if let Some(attendees) = options.attendees.filter(|n| *n > room.capacity) {
        violations.push(whole(
            ViolationKind::CapacityExceeded,
            Severity::High,
            format!(
                "{} attendees exceed the capacity of {} by {}",
                attendees,
                room.capacity,
                attendees - room.capacity
            ),
        ));
    }

    for tag in options.required_equipment {
        if !room.equipment.contains(tag) {
            violations.push(whole(
                ViolationKind::MissingEquipment,
                Severity::Medium,
                format!("room {} has no {}", room.id, tag),
            ));
        }
    }

    if let Some(range) = room.allowed_time_range.or(room.operating_hours) {
        let tz = room_timezone(room, config)?;
        for candidate in candidates {
            if !within_hours(candidate, range, tz) {
                violations.push(RuleViolation {
                    kind: ViolationKind::OutsideHours,
                    severity: Severity::Medium,
                    candidate: Some(*candidate),
                    message: format!("outside bookable hours {}", range),
                });
            }
        }
    }

    Ok(violations)
}

/// Whether `candidate` fits in the open interval of the local day it starts on.
fn within_hours(candidate: &Interval, range: TimeRange, tz: Tz) -> bool {
    let date = candidate.start.with_timezone(&tz).date_naive();
    day_bound(range, tz, date).is_some_and(|bound| bound.contains(candidate))
}

/// Same-day alternatives for the conflicting candidates of `report`.
///
/// For each conflicting candidate, in order: the slot ending right before a
/// conflicting booking, the slot starting right after one, then the position
/// in any other gap nearest the original start. Every alternative fits in a
/// free gap of the room's daily bound with the buffer kept clear.
fn suggest_alternatives(
    room: &Room,
    report: &ConflictReport,
    reservations: &[Reservation],
    options: &ConflictOptions<'_>,
    config: &EngineConfig,
) -> Result<Vec<Interval>> {
    let tz = room_timezone(room, config)?;
    let range = resolve_time_range(room, config.default_operating_hours).range;
    let buffer = Duration::minutes(i64::from(options.buffer_minutes));

    let busy: Vec<Interval> = active_for_room(reservations, &room.id)
        .into_iter()
        .filter(|r| !options.ignores(r))
        .map(|r| r.interval().padded(options.buffer_minutes))
        .collect();

    let mut picked: Vec<Interval> = Vec::new();

    for candidate in report.conflicting_candidates() {
        if picked.len() >= config.max_alternatives {
            break;
        }
        let date = candidate.start.with_timezone(&tz).date_naive();
        let Some(bound) = day_bound(range, tz, date) else {
            continue;
        };
        let length = candidate.duration();
        let gaps: Vec<Interval> =
            freebusy::find_free_slots(&busy, bound.start, bound.end, length.num_minutes().max(1))
                .into_iter()
                .map(|slot| slot.interval())
                .filter(|gap| gap.duration() >= length)
                .collect();
        let fits = |slot: &Interval| gaps.iter().any(|gap| gap.contains(slot));

        let hit: Vec<&Conflict> = report
            .conflicts
            .iter()
            .filter(|c| c.candidate == candidate)
            .collect();

        let mut options_for_candidate: Vec<Interval> = Vec::new();
        for conflict in &hit {
            let end = conflict.existing.start - buffer;
            options_for_candidate.push(Interval {
                start: end - length,
                end,
            });
        }
        for conflict in &hit {
            let start = conflict.existing.end + buffer;
            options_for_candidate.push(Interval {
                start,
                end: start + length,
            });
        }

        let mut nearest: Vec<Interval> = gaps
            .iter()
            .map(|gap| nearest_in_gap(gap, candidate.start, length))
            .collect();
        nearest.sort_by_key(|slot| ((slot.start - candidate.start).num_seconds().abs(), slot.start));
        options_for_candidate.extend(nearest);

        for slot in options_for_candidate {
            if picked.len() >= config.max_alternatives {
                break;
            }
            if slot != candidate && fits(&slot) && !picked.contains(&slot) {
                picked.push(slot);
            }
        }
    }

    Ok(picked)
}

/// Place a slot of `length` inside `gap` as close to `wanted` as possible.
fn nearest_in_gap(gap: &Interval, wanted: DateTime<Utc>, length: Duration) -> Interval {
    let latest = gap.end - length;
    let start = wanted.clamp(gap.start, latest.max(gap.start));
    Interval {
        start,
        end: start + length,
    }
}
