//! Event domain model.
//!
//! # Responsibility
//! - Define the canonical scheduled-event record and its closed enums.
//! - Carry caller input (`EventInput`, local wall-clock times) and the
//!   UTC-normalized candidate (`EventDraft`) that rules are evaluated on.
//! - Enforce bounded-length text fields before any rule evaluation.
//!
//! # Invariants
//! - `id` is stable and never reused for another event.
//! - `version` starts at 0 and is only advanced by the store.
//! - Stored instants have millisecond precision.
//! - `location` is trimmed; blank locations are stored as `None`.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 5000;
pub const LOCATION_MAX_CHARS: usize = 255;

/// Stable identifier of one event.
pub type EventId = Uuid;

/// Optimistic concurrency counter. Starts at 0 on creation.
pub type Version = u32;

/// Kind of gathering an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Rehearsal,
    Concert,
    Meeting,
    Other,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rehearsal => "rehearsal",
            Self::Concert => "concert",
            Self::Meeting => "meeting",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rehearsal" => Some(Self::Rehearsal),
            "concert" => Some(Self::Concert),
            "meeting" => Some(Self::Meeting),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Lifecycle state of an event.
///
/// `Canceled` events keep their row but never block a location slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Scheduled,
    Postponed,
    Canceled,
    Completed,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Postponed => "postponed",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "postponed" => Some(Self::Postponed),
            "canceled" => Some(Self::Canceled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Audience an event is published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVisibility {
    Public,
    Private,
}

impl EventVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Text field bound violated by caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldViolation {
    TitleBlank,
    TitleTooLong { max: usize, actual: usize },
    DescriptionTooLong { max: usize, actual: usize },
    LocationTooLong { max: usize, actual: usize },
}

impl FieldViolation {
    /// Machine-readable tag naming the violated field rule.
    pub fn rule_tag(&self) -> &'static str {
        match self {
            Self::TitleBlank => "title_blank",
            Self::TitleTooLong { .. } => "title_too_long",
            Self::DescriptionTooLong { .. } => "description_too_long",
            Self::LocationTooLong { .. } => "location_too_long",
        }
    }
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TitleBlank => write!(f, "title must not be blank"),
            Self::TitleTooLong { max, actual } => {
                write!(f, "title too long: {actual} chars, max {max}")
            }
            Self::DescriptionTooLong { max, actual } => {
                write!(f, "description too long: {actual} chars, max {max}")
            }
            Self::LocationTooLong { max, actual } => {
                write!(f, "location too long: {actual} chars, max {max}")
            }
        }
    }
}

impl Error for FieldViolation {}

/// Caller-supplied create/update payload with local wall-clock times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Omitted on create means `Scheduled`; omitted on update keeps the
    /// stored status.
    #[serde(default)]
    pub status: Option<EventStatus>,
    pub visibility: EventVisibility,
    pub local_start: NaiveDateTime,
    pub local_end: NaiveDateTime,
    /// IANA zone identifier used to interpret `local_start`/`local_end`.
    pub time_zone: String,
}

impl EventInput {
    /// Checks text bounds. Does not touch time fields.
    pub fn validate_fields(&self) -> Result<(), FieldViolation> {
        if self.title.trim().is_empty() {
            return Err(FieldViolation::TitleBlank);
        }
        let title_len = self.title.chars().count();
        if title_len > TITLE_MAX_CHARS {
            return Err(FieldViolation::TitleTooLong {
                max: TITLE_MAX_CHARS,
                actual: title_len,
            });
        }
        if let Some(description) = self.description.as_deref() {
            let len = description.chars().count();
            if len > DESCRIPTION_MAX_CHARS {
                return Err(FieldViolation::DescriptionTooLong {
                    max: DESCRIPTION_MAX_CHARS,
                    actual: len,
                });
            }
        }
        if let Some(location) = self.location.as_deref() {
            let len = location.trim().chars().count();
            if len > LOCATION_MAX_CHARS {
                return Err(FieldViolation::LocationTooLong {
                    max: LOCATION_MAX_CHARS,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

/// UTC-normalized candidate that business rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_type: EventType,
    pub status: Option<EventStatus>,
    pub visibility: EventVisibility,
    pub time_zone: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl EventDraft {
    /// Builds a draft from validated input and already-converted instants.
    pub fn from_input(input: &EventInput, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self {
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            location: normalize_location(input.location.as_deref()),
            event_type: input.event_type,
            status: input.status,
            visibility: input.visibility,
            time_zone: input.time_zone.trim().to_string(),
            start_at: start_at.trunc_subsecs(3),
            end_at: end_at.trunc_subsecs(3),
        }
    }
}

/// Canonical persisted event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub version: Version,
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
    /// Set by the store on insert.
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the store on every write.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Creates a not-yet-persisted event with a fresh id and version 0.
    pub fn from_draft(draft: &EventDraft) -> Self {
        Self::with_id(Uuid::new_v4(), draft)
    }

    /// Same as [`Event::from_draft`] with a caller-provided id.
    ///
    /// Used by import paths and tests that need deterministic ids.
    pub fn with_id(id: EventId, draft: &EventDraft) -> Self {
        Self {
            id,
            version: 0,
            title: draft.title.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            event_type: draft.event_type,
            status: draft.status.unwrap_or_default(),
            visibility: draft.visibility,
            time_zone: draft.time_zone.clone(),
            start_at: draft.start_at,
            end_at: draft.end_at,
            created_at: None,
            updated_at: None,
        }
    }

    /// Replaces all mutable fields with the draft (full replacement).
    ///
    /// `id`, `version` and store timestamps are left untouched.
    pub fn apply_draft(&mut self, draft: &EventDraft) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.location = draft.location.clone();
        self.event_type = draft.event_type;
        if let Some(status) = draft.status {
            self.status = status;
        }
        self.visibility = draft.visibility;
        self.time_zone = draft.time_zone.clone();
        self.start_at = draft.start_at;
        self.end_at = draft.end_at;
    }

    pub fn is_canceled(&self) -> bool {
        self.status == EventStatus::Canceled
    }
}

/// Trims a location and maps blank values to `None`.
pub fn normalize_location(location: Option<&str>) -> Option<String> {
    location
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
