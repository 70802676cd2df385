//! Per-occurrence overrides and the exception resolver.
//!
//! Exceptions are keyed by `(series_id, original_start)` at minute precision.
//! Applying them to a generated occurrence list removes cancelled occurrences
//! and relocates modified or moved ones; exceptions whose occurrence no longer
//! exists (for example after a pattern edit) are ignored.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::expander::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionType {
    Cancelled,
    /// Same meeting, new time.
    Modified,
    /// Same meeting, moved to another slot. Resolved exactly like `Modified`.
    Moved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub series_id: String,
    pub exception_type: ExceptionType,
    pub original_start_time: DateTime<Utc>,
    pub original_end_time: DateTime<Utc>,
    #[serde(default)]
    pub new_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub new_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Exception {
    pub fn cancel(series_id: impl Into<String>, occurrence: &Occurrence) -> Self {
        Self {
            series_id: series_id.into(),
            exception_type: ExceptionType::Cancelled,
            original_start_time: occurrence.original_start,
            original_end_time: occurrence.original_start + (occurrence.end - occurrence.start),
            new_start_time: None,
            new_end_time: None,
            reason: None,
        }
    }

    pub fn reschedule(
        series_id: impl Into<String>,
        occurrence: &Occurrence,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Self {
        Self {
            series_id: series_id.into(),
            exception_type: ExceptionType::Modified,
            original_start_time: occurrence.original_start,
            original_end_time: occurrence.original_start + (occurrence.end - occurrence.start),
            new_start_time: Some(new_start),
            new_end_time: Some(new_end),
            reason: None,
        }
    }

    pub fn with_type(mut self, exception_type: ExceptionType) -> Self {
        self.exception_type = exception_type;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// MODIFIED/MOVED exceptions need a non-empty replacement interval.
    pub fn validate(&self) -> Result<()> {
        if self.exception_type == ExceptionType::Cancelled {
            return Ok(());
        }
        match (self.new_start_time, self.new_end_time) {
            (Some(start), Some(end)) if end > start => Ok(()),
            (Some(start), Some(end)) => Err(EngineError::InvalidException(format!(
                "replacement end {} is not after start {}",
                end, start
            ))),
            _ => Err(EngineError::InvalidException(format!(
                "{:?} exception for {} needs new_start_time and new_end_time",
                self.exception_type, self.original_start_time
            ))),
        }
    }

    fn key(&self) -> DateTime<Utc> {
        minute_key(self.original_start_time)
    }
}

/// Truncate to whole minutes, the precision exceptions are matched at.
pub fn minute_key(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// The exceptions of one series, at most one per original start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionSet {
    series_id: String,
    by_start: HashMap<DateTime<Utc>, Exception>,
}

impl ExceptionSet {
    pub fn new(series_id: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            by_start: HashMap::new(),
        }
    }

    /// Collect existing exceptions; later entries for the same occurrence win.
    pub fn from_exceptions<I>(series_id: impl Into<String>, exceptions: I) -> Result<Self>
    where
        I: IntoIterator<Item = Exception>,
    {
        let mut set = Self::new(series_id);
        for exception in exceptions {
            set.upsert(exception)?;
        }
        Ok(set)
    }

    /// Insert or replace the exception for its occurrence.
    ///
    /// Returns the exception it replaced, if any.
    pub fn upsert(&mut self, exception: Exception) -> Result<Option<Exception>> {
        if exception.series_id != self.series_id {
            return Err(EngineError::InvalidException(format!(
                "exception belongs to series {}, not {}",
                exception.series_id, self.series_id
            )));
        }
        exception.validate()?;
        Ok(self.by_start.insert(exception.key(), exception))
    }

    /// Remove the exception for the occurrence originally starting at `original_start`.
    pub fn remove(&mut self, original_start: DateTime<Utc>) -> Result<Exception> {
        self.by_start
            .remove(&minute_key(original_start))
            .ok_or_else(|| EngineError::not_found("exception", original_start.to_rfc3339()))
    }

    pub fn get(&self, original_start: DateTime<Utc>) -> Option<&Exception> {
        self.by_start.get(&minute_key(original_start))
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    /// Exceptions sorted by original start.
    pub fn to_vec(&self) -> Vec<Exception> {
        let mut all: Vec<Exception> = self.by_start.values().cloned().collect();
        all.sort_by_key(|e| e.original_start_time);
        all
    }

    /// Resolve `occurrences` against this set. See [`apply_exceptions`].
    pub fn apply(&self, occurrences: Vec<Occurrence>) -> Vec<Occurrence> {
        let mut effective = Vec::with_capacity(occurrences.len());
        let mut matched = 0usize;

        for mut occurrence in occurrences {
            let Some(exception) = self.by_start.get(&minute_key(occurrence.original_start)) else {
                effective.push(occurrence);
                continue;
            };
            matched += 1;

            match exception.exception_type {
                ExceptionType::Cancelled => {}
                ExceptionType::Modified | ExceptionType::Moved => {
                    if let (Some(start), Some(end)) =
                        (exception.new_start_time, exception.new_end_time)
                    {
                        occurrence.start = start;
                        occurrence.end = end;
                    }
                    occurrence.exception = Some(exception.exception_type);
                    effective.push(occurrence);
                }
            }
        }

        if matched < self.by_start.len() {
            debug!(
                series_id = %self.series_id,
                unmatched = self.by_start.len() - matched,
                "ignoring exceptions without a matching occurrence"
            );
        }

        effective.sort_by_key(|o| (o.start, o.original_start));
        effective
    }
}

/// Overlay `exceptions` onto generated `occurrences`, producing the effective set.
///
/// Matching uses each occurrence's `original_start`, so the result of a first
/// application can be fed back in and comes out unchanged. Exceptions for other
/// series or with invalid replacement intervals are skipped.
pub fn apply_exceptions(occurrences: Vec<Occurrence>, exceptions: &[Exception]) -> Vec<Occurrence> {
    let Some(first) = exceptions.first() else {
        return occurrences;
    };
    let mut set = ExceptionSet::new(first.series_id.clone());
    for exception in exceptions {
        if let Err(e) = set.upsert(exception.clone()) {
            debug!(error = %e, "skipping unusable exception");
        }
    }
    set.apply(occurrences)
}
