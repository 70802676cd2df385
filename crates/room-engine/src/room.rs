//! Rooms and their daily opening hours.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Operational state of a room. Only `Available` rooms yield free slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    #[default]
    Available,
    Occupied,
    Maintenance,
    Reserved,
    Disabled,
}

/// A daily time-of-day range written as an `"HH:MM"` pair.
///
/// Stored as minutes after local midnight. `"24:00"` is accepted as an end
/// bound meaning "until midnight".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange", into = "RawTimeRange")]
pub struct TimeRange {
    start_minute: u16,
    end_minute: u16,
}

#[derive(Serialize, Deserialize)]
struct RawTimeRange {
    start: String,
    end: String,
}

impl TimeRange {
    /// The whole day, `00:00`–`24:00`.
    pub const FULL_DAY: TimeRange = TimeRange {
        start_minute: 0,
        end_minute: MINUTES_PER_DAY,
    };

    /// `09:00`–`18:00`, used for rooms without operating hours.
    pub const BUSINESS_HOURS: TimeRange = TimeRange {
        start_minute: 9 * 60,
        end_minute: 18 * 60,
    };

    pub fn new(start_minute: u16, end_minute: u16) -> Result<Self> {
        if end_minute > MINUTES_PER_DAY || start_minute >= end_minute {
            return Err(EngineError::InvalidTimeRange(format!(
                "{}-{}",
                format_minute(start_minute),
                format_minute(end_minute)
            )));
        }
        Ok(Self {
            start_minute,
            end_minute,
        })
    }

    /// Parse an `"HH:MM"` pair, e.g. `TimeRange::parse("09:00", "18:00")`.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_minute(start)?, parse_minute(end)?)
    }

    pub fn start_minute(&self) -> u16 {
        self.start_minute
    }

    pub fn end_minute(&self) -> u16 {
        self.end_minute
    }

    pub fn duration_minutes(&self) -> i64 {
        i64::from(self.end_minute - self.start_minute)
    }

    /// Local opening instant on `date`.
    pub fn opens_on(&self, date: NaiveDate) -> NaiveDateTime {
        at_minute(date, self.start_minute)
    }

    /// Local closing instant on `date`; `24:00` rolls over to the next midnight.
    pub fn closes_on(&self, date: NaiveDate) -> NaiveDateTime {
        at_minute(date, self.end_minute)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            format_minute(self.start_minute),
            format_minute(self.end_minute)
        )
    }
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = EngineError;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        TimeRange::parse(&raw.start, &raw.end)
    }
}

impl From<TimeRange> for RawTimeRange {
    fn from(range: TimeRange) -> Self {
        RawTimeRange {
            start: format_minute(range.start_minute),
            end: format_minute(range.end_minute),
        }
    }
}

fn parse_minute(s: &str) -> Result<u16> {
    let invalid = || EngineError::InvalidTimeRange(format!("expected HH:MM, got '{}'", s));
    if s.trim() == "24:00" {
        return Ok(MINUTES_PER_DAY);
    }
    let time = NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| invalid())?;
    Ok((time.hour() * 60 + time.minute()) as u16)
}

fn format_minute(minute: u16) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn at_minute(date: NaiveDate, minute: u16) -> NaiveDateTime {
    let midnight = date.and_time(NaiveTime::MIN);
    midnight + chrono::Duration::minutes(i64::from(minute))
}

/// A bookable room as served by the room catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub capacity: u32,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default)]
    pub location: Option<String>,
    /// Regular opening hours.
    #[serde(default)]
    pub operating_hours: Option<TimeRange>,
    /// Booking-rule override; wins over `operating_hours` when present.
    #[serde(default)]
    pub allowed_time_range: Option<TimeRange>,
    #[serde(default)]
    pub equipment: BTreeSet<String>,
    /// IANA timezone of the room; the engine default applies when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Room {
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            name: None,
            capacity,
            status: RoomStatus::Available,
            location: None,
            operating_hours: None,
            allowed_time_range: None,
            equipment: BTreeSet::new(),
            timezone: None,
        }
    }

    pub fn with_operating_hours(mut self, hours: TimeRange) -> Self {
        self.operating_hours = Some(hours);
        self
    }

    pub fn with_allowed_time_range(mut self, range: TimeRange) -> Self {
        self.allowed_time_range = Some(range);
        self
    }

    pub fn with_status(mut self, status: RoomStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    pub fn with_equipment<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equipment.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn is_bookable(&self) -> bool {
        self.status == RoomStatus::Available
    }
}
