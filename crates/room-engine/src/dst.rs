//! DST transition policies for local wall-clock times.
//!
//! Room hours and suggestion slots are written as local times ("09:00") and
//! have to be pinned to instants per day. Most days this is a plain lookup,
//! but on transition days a local time can be missing (spring forward) or
//! repeated (fall back).

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy for local times that fall into a DST transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Drop local times that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the first valid local time after the gap
    ShiftForward,
    /// Keep the wall-clock reading and apply the offset in force before the gap
    #[default]
    WallClock,
}

/// Pin a local wall-clock time in `tz` to an instant.
///
/// Ambiguous times (fall back) resolve to the earlier instant under every
/// policy. Nonexistent times (spring forward) follow `policy`; only `Skip`
/// yields `None`.
pub fn resolve_local(tz: Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => shift_forward(tz, local),
            DstPolicy::WallClock => {
                // Offset in force a day earlier is the pre-transition offset.
                let before = tz
                    .from_local_datetime(&(local - Duration::days(1)))
                    .earliest()?;
                let offset = before.offset().fix();
                let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
                Some(Utc.from_utc_datetime(&utc))
            }
        },
    }
}

/// Walk forward minute by minute until the local time exists again.
///
/// Real-world gaps are at most a couple of hours; the walk gives up after a
/// day so a broken tz database can never spin forever.
fn shift_forward(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    (1..=24 * 60).find_map(|minutes| {
        tz.from_local_datetime(&(local + Duration::minutes(minutes)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Parse an IANA timezone name.
pub fn parse_tz(name: &str) -> crate::error::Result<Tz> {
    name.parse()
        .map_err(|_| crate::error::EngineError::InvalidTimezone(name.to_string()))
}
