//! Static business rules for event candidates.
//!
//! # Responsibility
//! - Hold the configurable rules policy.
//! - Validate time ordering, duration bounds and past-creation policy.
//!
//! # Invariants
//! - Checks run in a fixed order and stop at the first violation.
//! - Validation is pure: the caller supplies "now".
//! - The past-creation check applies to updates exactly as to creates.

use crate::model::event::EventDraft;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound accepted for `max_duration_hours` (one year).
pub const MAX_DURATION_HOURS_LIMIT: u32 = 8764;

/// Numeric and boolean rule parameters drafts are validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesPolicy {
    pub min_duration_minutes: u32,
    pub max_duration_hours: u32,
    pub allow_overlap_same_location: bool,
    pub allow_create_in_past: bool,
}

impl Default for RulesPolicy {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            max_duration_hours: 240,
            allow_overlap_same_location: false,
            allow_create_in_past: true,
        }
    }
}

impl RulesPolicy {
    pub fn max_duration_minutes(&self) -> i64 {
        i64::from(self.max_duration_hours) * 60
    }
}

/// Which duration bound a candidate crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBound {
    TooShort,
    TooLong,
}

/// Business rule violated by a candidate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    /// `end_at` is not strictly after `start_at`.
    Ordering {
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },
    Duration {
        bound: DurationBound,
        limit_minutes: i64,
        actual_minutes: i64,
    },
    /// Start lies before "now" while the policy forbids it.
    PastCreation {
        start_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// Another non-canceled event occupies the same location slot.
    LocationOverlap { location: String, conflicts: u64 },
}

impl RuleViolation {
    /// Machine-readable rule tag for callers.
    pub fn rule_tag(&self) -> &'static str {
        match self {
            Self::Ordering { .. } => "ordering",
            Self::Duration {
                bound: DurationBound::TooShort,
                ..
            } => "duration_too_short",
            Self::Duration {
                bound: DurationBound::TooLong,
                ..
            } => "duration_too_long",
            Self::PastCreation { .. } => "past_creation",
            Self::LocationOverlap { .. } => "location_overlap",
        }
    }
}

impl Display for RuleViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordering { .. } => write!(f, "end must be strictly after start"),
            Self::Duration {
                bound: DurationBound::TooShort,
                limit_minutes,
                ..
            } => write!(f, "duration too short: min {limit_minutes} minutes"),
            Self::Duration {
                bound: DurationBound::TooLong,
                limit_minutes,
                ..
            } => write!(f, "duration too long: max {} hours", limit_minutes / 60),
            Self::PastCreation { .. } => {
                write!(f, "creating events in the past is disabled by policy")
            }
            Self::LocationOverlap { location, conflicts } => write!(
                f,
                "time slot overlaps with {conflicts} other event(s) at location `{location}`"
            ),
        }
    }
}

impl Error for RuleViolation {}

/// Validates a draft against the policy.
pub fn validate(
    draft: &EventDraft,
    policy: &RulesPolicy,
    now: DateTime<Utc>,
) -> Result<(), RuleViolation> {
    validate_span(draft.start_at, draft.end_at, policy, now)
}

/// Validates a raw time span against the policy.
pub fn validate_span(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    policy: &RulesPolicy,
    now: DateTime<Utc>,
) -> Result<(), RuleViolation> {
    if end_at <= start_at {
        return Err(RuleViolation::Ordering { start_at, end_at });
    }

    let minutes = (end_at - start_at).num_minutes();
    let min_minutes = i64::from(policy.min_duration_minutes);
    if minutes < min_minutes {
        return Err(RuleViolation::Duration {
            bound: DurationBound::TooShort,
            limit_minutes: min_minutes,
            actual_minutes: minutes,
        });
    }
    let max_minutes = policy.max_duration_minutes();
    if minutes > max_minutes {
        return Err(RuleViolation::Duration {
            bound: DurationBound::TooLong,
            limit_minutes: max_minutes,
            actual_minutes: minutes,
        });
    }

    if !policy.allow_create_in_past && start_at < now {
        return Err(RuleViolation::PastCreation { start_at, now });
    }

    Ok(())
}
