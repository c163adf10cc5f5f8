//! Domain model for scheduled events.
//!
//! # Responsibility
//! - Define canonical data structures used by the rule engine.
//! - Provide outward-facing projections (`EventView`, `CalendarEventItem`).
//!
//! # Invariants
//! - Every event is identified by a stable `EventId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod event;
pub mod view;
