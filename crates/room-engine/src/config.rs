//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! safety_cap = 500
//! min_slot_minutes = 30
//! default_timezone = "Europe/Berlin"
//! dst_policy = "shift_forward"
//!
//! [default_operating_hours]
//! start = "08:00"
//! end = "20:00"
//! ```
//!
//! Rooms without hours of their own can instead be open all day:
//!
//! ```toml
//! default_operating_hours = "full_day"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dst::{parse_tz, DstPolicy};
use crate::error::{EngineError, Result};
use crate::expander::DEFAULT_SAFETY_CAP;
use crate::room::TimeRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Hard upper bound on occurrences per expansion.
    pub safety_cap: usize,
    /// Shortest free window the availability calculator reports.
    pub min_slot_minutes: i64,
    /// Hours used for rooms without operating hours. `None` means the full
    /// day and is written as `"full_day"` in TOML.
    #[serde(with = "default_hours")]
    pub default_operating_hours: Option<TimeRange>,
    /// Timezone for rooms that do not declare one.
    pub default_timezone: String,
    /// Maximum alternative slots proposed with a conflict report.
    pub max_alternatives: usize,
    /// First hour (local) the suggestion ranker proposes.
    pub suggestion_first_hour: u32,
    /// Hour (local) at which the last proposed slot ends.
    pub suggestion_last_hour: u32,
    /// Suggestions must score strictly above this.
    pub min_suggestion_score: u8,
    /// Capacity a room needs for the capacity bonus when the user states none.
    pub default_min_capacity: u32,
    pub dst_policy: DstPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            safety_cap: DEFAULT_SAFETY_CAP,
            min_slot_minutes: 30,
            default_operating_hours: Some(TimeRange::BUSINESS_HOURS),
            default_timezone: "UTC".to_string(),
            max_alternatives: 3,
            suggestion_first_hour: 8,
            suggestion_last_hour: 22,
            min_suggestion_score: 30,
            default_min_capacity: 2,
            dst_policy: DstPolicy::WallClock,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.safety_cap == 0 {
            return Err(EngineError::Config("safety_cap must be at least 1".into()));
        }
        if self.min_slot_minutes < 1 {
            return Err(EngineError::Config(
                "min_slot_minutes must be at least 1".into(),
            ));
        }
        if self.suggestion_first_hour >= self.suggestion_last_hour || self.suggestion_last_hour > 24
        {
            return Err(EngineError::Config(format!(
                "suggestion hours {}..{} must satisfy first < last <= 24",
                self.suggestion_first_hour, self.suggestion_last_hour
            )));
        }
        if self.min_suggestion_score > 100 {
            return Err(EngineError::Config(
                "min_suggestion_score must be at most 100".into(),
            ));
        }
        parse_tz(&self.default_timezone)
            .map_err(|_| EngineError::Config(format!("unknown timezone {}", self.default_timezone)))?;
        Ok(())
    }
}

/// `default_operating_hours` as either a start/end table or `"full_day"`.
mod default_hours {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::room::TimeRange;

    const FULL_DAY: &str = "full_day";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Range(TimeRange),
        Named(String),
    }

    pub fn serialize<S: Serializer>(hours: &Option<TimeRange>, serializer: S) -> Result<S::Ok, S::Error> {
        match hours {
            Some(range) => range.serialize(serializer),
            None => serializer.serialize_str(FULL_DAY),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<TimeRange>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Range(range) => Ok(Some(range)),
            Raw::Named(name) if name == FULL_DAY => Ok(None),
            Raw::Named(name) => Err(D::Error::custom(format!(
                "default_operating_hours must be a start/end table or \"{}\", got \"{}\"",
                FULL_DAY, name
            ))),
        }
    }
}
