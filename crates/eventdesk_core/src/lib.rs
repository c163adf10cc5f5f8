//! Core domain logic for EventDesk.
//! This crate is the single source of truth for event scheduling invariants.

pub mod clock;
pub mod concurrency;
pub mod config;
pub mod conflict;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod rules;
pub mod search;
pub mod service;
pub mod timezone;

pub use clock::{Clock, FixedClock, SystemClock};
pub use concurrency::{format_etag, parse_if_match, Precondition, PreconditionError};
pub use config::{ConfigError, EventsConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_settings, logging_status};
pub use model::event::{
    Event, EventDraft, EventId, EventInput, EventStatus, EventType, EventVisibility, Version,
};
pub use model::view::{CalendarEventItem, EventView};
pub use repo::event_repo::{EventStore, RepoError, RepoResult, SqliteEventStore};
pub use repo::memory_repo::InMemoryEventStore;
pub use rules::{RuleViolation, RulesPolicy};
pub use search::filter::{compose, EventFilter, LocationMatch, SearchParams, TimeRange};
pub use search::page::{Page, PageRequest, Sort, SortDirection, SortKey};
pub use service::error::{ErrorKind, EventServiceError, ValidationError};
pub use service::event_service::EventService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
