//! Holiday calendars, keyed by region code.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Source of holiday dates for a region.
///
/// Returning an empty set for an unknown region is the expected behavior;
/// an `Err` means the calendar itself failed, and callers degrade to not
/// skipping anything.
pub trait HolidayCalendar {
    /// Holiday dates in `region` between `from` and `to`, both inclusive.
    fn holidays_between(&self, region: &str, from: NaiveDate, to: NaiveDate)
        -> Result<BTreeSet<NaiveDate>>;
}

/// A fixed holiday table, typically loaded alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticHolidayCalendar {
    regions: HashMap<String, BTreeSet<NaiveDate>>,
}

impl StaticHolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays<I>(mut self, region: impl Into<String>, dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.regions.entry(region.into()).or_default().extend(dates);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.regions.values().all(BTreeSet::is_empty)
    }
}

impl HolidayCalendar for StaticHolidayCalendar {
    fn holidays_between(
        &self,
        region: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        if from > to {
            return Ok(BTreeSet::new());
        }
        Ok(self
            .regions
            .get(region)
            .map(|dates| dates.range(from..=to).copied().collect())
            .unwrap_or_default())
    }
}
