//! Rank (room, hour) pairs for a user on a given day.
//!
//! Every room is offered in whole-hour slots. A slot is only considered when
//! it lies entirely inside one of the room's free slots; it is then scored
//! from a base of 50 by additive factors, clamped to 100, and kept only if it
//! scores above the configured threshold.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::{room_timezone, RoomAvailability};
use crate::config::EngineConfig;
use crate::dst::resolve_local;
use crate::error::Result;
use crate::interval::Interval;
use crate::room::Room;

const BASE_SCORE: u32 = 50;
const MAX_SCORE: u32 = 100;
const MAX_REASONS: usize = 3;
const MAX_CONFIDENCE: f64 = 0.95;

/// A scoring family the caller can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    TimePreference,
    EquipmentMatch,
    UsagePattern,
    LocationProximity,
}

impl Algorithm {
    /// Used when a request names no algorithm.
    pub fn defaults() -> Vec<Algorithm> {
        vec![Algorithm::UsagePattern, Algorithm::EquipmentMatch]
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "time-preference" => Ok(Algorithm::TimePreference),
            "equipment-match" => Ok(Algorithm::EquipmentMatch),
            "usage-pattern" => Ok(Algorithm::UsagePattern),
            "location-proximity" => Ok(Algorithm::LocationProximity),
            other => Err(format!("unknown algorithm '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// Local start hours covered.
    pub fn hours(self) -> Range<u32> {
        match self {
            TimeOfDay::Morning => 8..12,
            TimeOfDay::Afternoon => 12..18,
            TimeOfDay::Evening => 18..22,
        }
    }

    fn bonus(self) -> u8 {
        match self {
            TimeOfDay::Morning => 20,
            TimeOfDay::Afternoon => 15,
            TimeOfDay::Evening => 10,
        }
    }
}

/// What a user told us, or what their history implies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub preferred_times: Vec<TimeOfDay>,
    pub equipment_requirements: BTreeSet<String>,
    pub min_capacity: Option<u32>,
    pub location_preference: Option<String>,
}

/// A room together with the signals the ranker needs about it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSignals {
    pub room: Room,
    pub availability: RoomAvailability,
    /// Completed reservations by the requesting user in this room.
    pub completed_reservations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    /// Local day to propose slots on, in each room's timezone.
    pub date: NaiveDate,
    pub preferences: UserPreferences,
    /// Empty means [`Algorithm::defaults`].
    pub algorithms: Vec<Algorithm>,
    pub max_results: usize,
}

/// One contributing factor of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Factor {
    MorningPreference,
    AfternoonPreference,
    EveningPreference,
    FullEquipmentMatch,
    PartialEquipmentMatch,
    FrequentlyUsed,
    PreviouslyUsed,
    PreferredLocation,
    SufficientCapacity,
    GoldenHour,
    GoodHour,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Factor::MorningPreference => "matches your morning preference",
            Factor::AfternoonPreference => "matches your afternoon preference",
            Factor::EveningPreference => "matches your evening preference",
            Factor::FullEquipmentMatch => "has all required equipment",
            Factor::PartialEquipmentMatch => "has most required equipment",
            Factor::FrequentlyUsed => "you use this room often",
            Factor::PreviouslyUsed => "you have used this room before",
            Factor::PreferredLocation => "in your preferred location",
            Factor::SufficientCapacity => "large enough",
            Factor::GoldenHour => "prime meeting hour",
            Factor::GoodHour => "good meeting hour",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub factor: Factor,
    pub points: u8,
}

/// Score of one (room, hour) pair before thresholding.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotScore {
    pub score: u8,
    pub confidence: f64,
    /// Every contributing factor, in computation order.
    pub factors: Vec<Reason>,
}

impl SlotScore {
    /// The highest-impact factors, at most three, in computation order.
    pub fn top_reasons(&self) -> Vec<Reason> {
        let mut ranked: Vec<(usize, &Reason)> = self.factors.iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.points.cmp(&a.1.points).then(a.0.cmp(&b.0)));
        ranked.truncate(MAX_REASONS);
        ranked.sort_by_key(|(index, _)| *index);
        ranked.into_iter().map(|(_, reason)| *reason).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub room_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub score: u8,
    pub confidence: f64,
    pub reasons: Vec<Reason>,
}

/// Score `room` for a slot starting at local `hour`.
///
/// Preference factors only count when their algorithm is in `algorithms`;
/// capacity and hour-of-day bonuses always apply.
pub fn score_slot(
    room: &Room,
    hour: u32,
    preferences: &UserPreferences,
    completed_reservations: u32,
    algorithms: &[Algorithm],
    config: &EngineConfig,
) -> SlotScore {
    let enabled = |a: Algorithm| algorithms.contains(&a);
    let mut factors: Vec<Reason> = Vec::new();
    let mut add = |factor: Factor, points: u8| factors.push(Reason { factor, points });

    if enabled(Algorithm::TimePreference) {
        if let Some(time) = preferences
            .preferred_times
            .iter()
            .find(|t| t.hours().contains(&hour))
        {
            let factor = match time {
                TimeOfDay::Morning => Factor::MorningPreference,
                TimeOfDay::Afternoon => Factor::AfternoonPreference,
                TimeOfDay::Evening => Factor::EveningPreference,
            };
            add(factor, time.bonus());
        }
    }

    let required = &preferences.equipment_requirements;
    if enabled(Algorithm::EquipmentMatch) && !required.is_empty() {
        let matched = required.intersection(&room.equipment).count();
        if matched == required.len() {
            add(Factor::FullEquipmentMatch, 25);
        } else if matched * 2 >= required.len() {
            add(Factor::PartialEquipmentMatch, 15);
        }
    }

    if enabled(Algorithm::UsagePattern) {
        match completed_reservations {
            0 => {}
            1 | 2 => add(Factor::PreviouslyUsed, 10),
            _ => add(Factor::FrequentlyUsed, 20),
        }
    }

    if enabled(Algorithm::LocationProximity) {
        let wanted = preferences
            .location_preference
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let (Some(wanted), Some(location)) = (wanted, room.location.as_deref()) {
            if location.to_lowercase().contains(&wanted.to_lowercase()) {
                add(Factor::PreferredLocation, 15);
            }
        }
    }

    let min_capacity = preferences
        .min_capacity
        .unwrap_or(config.default_min_capacity);
    if room.capacity >= min_capacity {
        add(Factor::SufficientCapacity, 10);
    }

    match hour {
        9..=11 => add(Factor::GoldenHour, 15),
        14..=16 => add(Factor::GoodHour, 10),
        _ => {}
    }

    let total = BASE_SCORE + factors.iter().map(|r| u32::from(r.points)).sum::<u32>();
    let score = total.min(MAX_SCORE) as u8;
    let confidence = (0.5
        + f64::from(score) / 100.0 * 0.3
        + factors.len() as f64 / 3.0 * 0.2
        + algorithms.len() as f64 / 4.0 * 0.1)
        .min(MAX_CONFIDENCE);

    SlotScore {
        score,
        confidence,
        factors,
    }
}

/// Rank hourly slots across `rooms` for one day.
///
/// Rooms that are not bookable contribute nothing. Results are ordered by
/// score (descending), then start, then room id, and truncated to
/// `request.max_results`.
pub fn suggest(
    rooms: &[RoomSignals],
    request: &SuggestionRequest,
    config: &EngineConfig,
) -> Result<Vec<Suggestion>> {
    let mut algorithms: Vec<Algorithm> = if request.algorithms.is_empty() {
        Algorithm::defaults()
    } else {
        request.algorithms.clone()
    };
    algorithms.sort();
    algorithms.dedup();

    let preferred = &request.preferences.preferred_times;
    let mut suggestions = Vec::new();

    for signals in rooms.iter().filter(|s| s.availability.bookable) {
        let tz = room_timezone(&signals.room, config)?;

        for hour in config.suggestion_first_hour..config.suggestion_last_hour {
            if !preferred.is_empty() && !preferred.iter().any(|t| t.hours().contains(&hour)) {
                continue;
            }
            let Some(local) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                continue;
            };
            let Some(start) = resolve_local(tz, request.date.and_time(local), config.dst_policy)
            else {
                continue;
            };
            let slot = Interval {
                start,
                end: start + Duration::hours(1),
            };
            if !signals.availability.is_free(&slot) {
                continue;
            }

            let scored = score_slot(
                &signals.room,
                hour,
                &request.preferences,
                signals.completed_reservations,
                &algorithms,
                config,
            );
            if scored.score <= config.min_suggestion_score {
                continue;
            }
            suggestions.push(Suggestion {
                room_id: signals.room.id.clone(),
                start_time: slot.start,
                end_time: slot.end,
                score: scored.score,
                confidence: scored.confidence,
                reasons: scored.top_reasons(),
            });
        }
    }

    suggestions.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.start_time.cmp(&b.start_time))
            .then_with(|| a.room_id.cmp(&b.room_id))
    });
    suggestions.truncate(request.max_results);
    Ok(suggestions)
}
