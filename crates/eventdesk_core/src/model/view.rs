//! Outward-facing event projections.
//!
//! Local time strings here are for display only; `start_at`/`end_at` stay
//! the authoritative instants.

use crate::concurrency::format_etag;
use crate::model::event::{Event, EventId, EventStatus, EventType, EventVisibility, Version};
use crate::timezone::{display_in, resolve_zone, TimeError};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Full event response with local renderings in the event's own zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: EventId,
    pub version: Version,
    /// Entity tag for the current version.
    pub etag: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: EventStatus,
    pub visibility: EventVisibility,
    pub time_zone: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub start_local: String,
    pub end_local: String,
}

impl EventView {
    pub fn from_event(event: &Event) -> Result<Self, TimeError> {
        let tz = resolve_zone(&event.time_zone)?;
        Ok(Self {
            id: event.id,
            version: event.version,
            etag: format_etag(event.version),
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            event_type: event.event_type,
            status: event.status,
            visibility: event.visibility,
            time_zone: event.time_zone.clone(),
            start_at: event.start_at,
            end_at: event.end_at,
            start_local: display_in(&tz, event.start_at),
            end_local: display_in(&tz, event.end_at),
        })
    }
}

/// Lightweight calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventItem {
    pub id: EventId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: EventStatus,
    pub location: Option<String>,
    /// Present only when a display zone was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_local: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_local: Option<String>,
}

impl CalendarEventItem {
    /// Projects an event, rendering local times in `zone` when given.
    pub fn from_event(event: &Event, zone: Option<&Tz>) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            start: event.start_at,
            end: event.end_at,
            all_day: false,
            event_type: event.event_type,
            status: event.status,
            location: event.location.clone(),
            start_local: zone.map(|tz| display_in(tz, event.start_at)),
            end_local: zone.map(|tz| display_in(tz, event.end_at)),
        }
    }
}
