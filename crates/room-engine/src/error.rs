//! Error types for room-engine operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid recurrence pattern: {}", .0.join("; "))]
    InvalidPattern(Vec<String>),

    #[error("Invalid interval: end {end} is not after start {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid exception: {0}")]
    InvalidException(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Raised by a conflict-safe write path, never by the read-side detector.
    #[error("Reservation {reservation_id} overlaps an existing booking in room {room_id}")]
    Overlap {
        room_id: String,
        reservation_id: String,
    },

    #[error("Recurrence rule rejected: {0}")]
    Rule(String),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
