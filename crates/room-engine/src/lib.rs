//! # room-engine
//!
//! Scheduling core for a room-reservation system.
//!
//! The engine turns recurrence patterns into concrete occurrences, overlays
//! per-occurrence exceptions, detects overlaps with existing bookings,
//! computes free time and ranks room suggestions. It is pure computation over
//! data read through collaborator traits; persistence belongs to the caller.
//!
//! ## Modules
//!
//! - [`pattern`] — recurrence patterns and the pattern validator
//! - [`expander`] — series → occurrences, DST-aware, capped
//! - [`exceptions`] — cancelled / modified / moved occurrences
//! - [`conflict`] — overlap detection with alternatives
//! - [`availability`] — effective opening hours and free slots
//! - [`suggest`] — scored room/slot suggestions
//! - [`store`] — collaborator traits and an in-memory store
//! - [`engine`] — the [`Scheduler`] façade
//! - [`config`] — TOML-loadable [`EngineConfig`]
//! - [`error`] — error types

pub mod availability;
pub mod config;
pub mod conflict;
pub mod dst;
pub mod engine;
pub mod error;
pub mod exceptions;
pub mod expander;
pub mod freebusy;
pub mod holiday;
pub mod interval;
pub mod pattern;
pub mod reservation;
pub mod room;
pub mod series;
pub mod store;
pub mod suggest;

pub use availability::{calculate_availability, RoomAvailability, TimeRangeSource};
pub use config::EngineConfig;
pub use conflict::{check_conflict, find_conflicts, ConflictReport, OverlapKind, RuleViolation, ViolationKind};
pub use dst::DstPolicy;
pub use engine::Scheduler;
pub use error::{EngineError, Result};
pub use exceptions::{apply_exceptions, Exception, ExceptionSet, ExceptionType};
pub use expander::{generate, Occurrence};
pub use freebusy::{find_free_slots, AvailabilitySlot};
pub use interval::Interval;
pub use pattern::{validate, RecurrencePattern};
pub use reservation::{Reservation, ReservationStatus};
pub use room::{Room, RoomStatus, TimeRange};
pub use series::{BatchOperation, BatchOutcome, RecurringSeries, SeriesStatistics, SeriesStatus};
pub use store::{InMemoryStore, Snapshot};
pub use suggest::{suggest, Algorithm, Suggestion, UserPreferences};
