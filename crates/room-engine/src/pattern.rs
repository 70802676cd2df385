//! Recurrence patterns and the pattern validator.
//!
//! A [`RecurrencePattern`] is the user-facing description of a repeating
//! booking ("every other week on Monday and Thursday, ten times"). It is
//! validated here before the expander ever sees it, so that degenerate input
//! (zero interval, weekly with no days) cannot reach the generator.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const MAX_INTERVAL: u32 = 999;
pub const MAX_END_COUNT: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Expanded with a daily cadence.
    Custom,
}

/// Two-letter weekday codes, RFC 5545 style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayCode {
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
    Su,
}

impl DayCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DayCode::Mo => "MO",
            DayCode::Tu => "TU",
            DayCode::We => "WE",
            DayCode::Th => "TH",
            DayCode::Fr => "FR",
            DayCode::Sa => "SA",
            DayCode::Su => "SU",
        }
    }

    pub fn weekday(self) -> Weekday {
        match self {
            DayCode::Mo => Weekday::Mon,
            DayCode::Tu => Weekday::Tue,
            DayCode::We => Weekday::Wed,
            DayCode::Th => Weekday::Thu,
            DayCode::Fr => Weekday::Fri,
            DayCode::Sa => Weekday::Sat,
            DayCode::Su => Weekday::Sun,
        }
    }
}

impl From<Weekday> for DayCode {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayCode::Mo,
            Weekday::Tue => DayCode::Tu,
            Weekday::Wed => DayCode::We,
            Weekday::Thu => DayCode::Th,
            Weekday::Fri => DayCode::Fr,
            Weekday::Sat => DayCode::Sa,
            Weekday::Sun => DayCode::Su,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthlyPattern {
    /// Same day of the month (`monthly_date`).
    Date,
    /// Nth weekday of the month (`monthly_week` + `monthly_week_day`).
    Weekday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndCondition {
    #[default]
    Never,
    Date,
    Count,
}

/// How a recurring booking repeats and when it stops.
///
/// Only the fields relevant to `kind` and `end_condition` are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub kind: RecurrenceType,
    pub interval: u32,
    #[serde(default)]
    pub week_days: Vec<DayCode>,
    #[serde(default)]
    pub monthly_pattern: Option<MonthlyPattern>,
    #[serde(default)]
    pub monthly_date: Option<u32>,
    /// 1..=5, or -1 for the last such weekday of the month.
    #[serde(default)]
    pub monthly_week: Option<i32>,
    #[serde(default)]
    pub monthly_week_day: Option<DayCode>,
    #[serde(default)]
    pub end_condition: EndCondition,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_count: Option<u32>,
    #[serde(default)]
    pub skip_holidays: bool,
    #[serde(default)]
    pub holiday_region: Option<String>,
}

impl RecurrencePattern {
    fn base(kind: RecurrenceType, interval: u32) -> Self {
        Self {
            kind,
            interval,
            week_days: Vec::new(),
            monthly_pattern: None,
            monthly_date: None,
            monthly_week: None,
            monthly_week_day: None,
            end_condition: EndCondition::Never,
            end_date: None,
            end_count: None,
            skip_holidays: false,
            holiday_region: None,
        }
    }

    pub fn daily(interval: u32) -> Self {
        Self::base(RecurrenceType::Daily, interval)
    }

    pub fn weekly(interval: u32, days: &[DayCode]) -> Self {
        let mut pattern = Self::base(RecurrenceType::Weekly, interval);
        pattern.week_days = days.to_vec();
        pattern
    }

    pub fn monthly_on_date(interval: u32, day: u32) -> Self {
        let mut pattern = Self::base(RecurrenceType::Monthly, interval);
        pattern.monthly_pattern = Some(MonthlyPattern::Date);
        pattern.monthly_date = Some(day);
        pattern
    }

    pub fn monthly_on_weekday(interval: u32, week: i32, day: DayCode) -> Self {
        let mut pattern = Self::base(RecurrenceType::Monthly, interval);
        pattern.monthly_pattern = Some(MonthlyPattern::Weekday);
        pattern.monthly_week = Some(week);
        pattern.monthly_week_day = Some(day);
        pattern
    }

    pub fn yearly(interval: u32) -> Self {
        Self::base(RecurrenceType::Yearly, interval)
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end_condition = EndCondition::Date;
        self.end_date = Some(end);
        self.end_count = None;
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.end_condition = EndCondition::Count;
        self.end_count = Some(count);
        self.end_date = None;
        self
    }

    pub fn skipping_holidays(mut self, region: impl Into<String>) -> Self {
        self.skip_holidays = true;
        self.holiday_region = Some(region.into());
        self
    }

    /// Count limit, when the end condition is count-based.
    pub fn count_limit(&self) -> Option<u32> {
        match self.end_condition {
            EndCondition::Count => self.end_count,
            _ => None,
        }
    }

    /// Inclusive end instant, when the end condition is date-based.
    pub fn date_limit(&self) -> Option<DateTime<Utc>> {
        match self.end_condition {
            EndCondition::Date => self.end_date,
            _ => None,
        }
    }

    /// RFC 5545 RRULE body (without the `RRULE:` prefix) for the cadence only.
    ///
    /// End conditions are not encoded; the expander applies them while
    /// walking, after holiday skips.
    pub fn to_rrule(&self) -> String {
        let freq = match self.kind {
            RecurrenceType::Daily | RecurrenceType::Custom => "DAILY",
            RecurrenceType::Weekly => "WEEKLY",
            RecurrenceType::Monthly => "MONTHLY",
            RecurrenceType::Yearly => "YEARLY",
        };
        let mut parts = vec![format!("FREQ={}", freq), format!("INTERVAL={}", self.interval)];

        match self.kind {
            RecurrenceType::Weekly => {
                let mut days = self.week_days.clone();
                days.sort();
                days.dedup();
                let codes: Vec<&str> = days.iter().map(|d| d.as_str()).collect();
                parts.push(format!("BYDAY={}", codes.join(",")));
            }
            RecurrenceType::Monthly => match self.monthly_pattern {
                Some(MonthlyPattern::Date) => {
                    if let Some(day) = self.monthly_date {
                        parts.push(format!("BYMONTHDAY={}", day));
                    }
                }
                Some(MonthlyPattern::Weekday) => {
                    if let (Some(week), Some(day)) = (self.monthly_week, self.monthly_week_day) {
                        parts.push(format!("BYDAY={}", day.as_str()));
                        parts.push(format!("BYSETPOS={}", week));
                    }
                }
                None => {}
            },
            _ => {}
        }

        parts.push("WKST=MO".to_string());
        parts.join(";")
    }
}

/// Outcome of [`validate`]: every problem found, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert into a `Result`, for callers that cannot proceed on failure.
    pub fn into_result(self) -> crate::error::Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(crate::error::EngineError::InvalidPattern(self.errors))
        }
    }
}

/// Validate a pattern against the start of the series it belongs to.
pub fn validate(pattern: &RecurrencePattern, series_start: DateTime<Utc>) -> ValidationReport {
    let mut errors = Vec::new();

    if pattern.interval < 1 {
        errors.push("interval must be at least 1".to_string());
    } else if pattern.interval > MAX_INTERVAL {
        errors.push(format!("interval must be at most {}", MAX_INTERVAL));
    }

    if pattern.kind == RecurrenceType::Weekly && pattern.week_days.is_empty() {
        errors.push("weekly pattern requires at least one weekday".to_string());
    }

    if pattern.kind == RecurrenceType::Monthly {
        match pattern.monthly_pattern {
            Some(MonthlyPattern::Date) => match pattern.monthly_date {
                None => errors.push("date-monthly pattern requires monthly_date".to_string()),
                Some(day) if !(1..=31).contains(&day) => {
                    errors.push(format!("monthly_date {} is outside 1..=31", day))
                }
                Some(_) => {}
            },
            Some(MonthlyPattern::Weekday) => {
                match pattern.monthly_week {
                    None => {
                        errors.push("weekday-monthly pattern requires monthly_week".to_string())
                    }
                    Some(week) if !((1..=5).contains(&week) || week == -1) => errors.push(format!(
                        "monthly_week {} must be 1..=5 or -1",
                        week
                    )),
                    Some(_) => {}
                }
                if pattern.monthly_week_day.is_none() {
                    errors.push("weekday-monthly pattern requires monthly_week_day".to_string());
                }
            }
            None => {}
        }
    }

    match pattern.end_condition {
        EndCondition::Never => {}
        EndCondition::Count => match pattern.end_count {
            None => errors.push("count end condition requires end_count".to_string()),
            Some(0) => errors.push("end_count must be at least 1".to_string()),
            Some(n) if n > MAX_END_COUNT => {
                errors.push(format!("end_count must be at most {}", MAX_END_COUNT))
            }
            Some(_) => {}
        },
        EndCondition::Date => match pattern.end_date {
            None => errors.push("date end condition requires end_date".to_string()),
            Some(end) if end <= series_start => {
                errors.push("end_date must be after the series start".to_string())
            }
            Some(_) => {}
        },
    }

    ValidationReport::from_errors(errors)
}
