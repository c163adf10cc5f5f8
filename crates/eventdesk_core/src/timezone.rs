//! Wall-clock/instant conversion against the IANA zone database.
//!
//! # Responsibility
//! - Resolve zone identifiers in one place for create, update and display.
//! - Convert local date-times to UTC instants and back for display.
//!
//! # Invariants
//! - Ambiguous local times (fall-back overlap) resolve to the earlier instant.
//! - Local times inside a spring-forward gap are shifted later by the gap
//!   length, i.e. read with the offset in force before the transition.
//! - Display strings are informational only; instants are authoritative.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Conversion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Zone id is blank or not a known IANA identifier.
    InvalidTimeZone(String),
    /// Local time cannot be represented as an instant.
    OutOfRange(NaiveDateTime),
}

impl TimeError {
    pub fn rule_tag(&self) -> &'static str {
        match self {
            Self::InvalidTimeZone(_) => "invalid_time_zone",
            Self::OutOfRange(_) => "time_out_of_range",
        }
    }
}

impl Display for TimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimeZone(zone_id) => write!(f, "invalid time zone: `{zone_id}`"),
            Self::OutOfRange(local) => write!(f, "local time out of range: {local}"),
        }
    }
}

impl Error for TimeError {}

/// Parses an IANA zone identifier.
pub fn resolve_zone(zone_id: &str) -> Result<Tz, TimeError> {
    let trimmed = zone_id.trim();
    if trimmed.is_empty() {
        return Err(TimeError::InvalidTimeZone(zone_id.to_string()));
    }
    trimmed
        .parse::<Tz>()
        .map_err(|_| TimeError::InvalidTimeZone(trimmed.to_string()))
}

/// Interprets `local` in `zone_id` and returns the absolute instant.
pub fn to_instant(local: NaiveDateTime, zone_id: &str) -> Result<DateTime<Utc>, TimeError> {
    let tz = resolve_zone(zone_id)?;
    localize(&tz, local).map(|value| value.with_timezone(&Utc))
}

/// Renders `instant` as an RFC 3339 string with the zone's offset.
///
/// Zero offsets render as `Z`.
pub fn to_local_display(instant: DateTime<Utc>, zone_id: &str) -> Result<String, TimeError> {
    let tz = resolve_zone(zone_id)?;
    Ok(display_in(&tz, instant))
}

/// Same as [`to_local_display`] for an already-resolved zone.
pub fn display_in(tz: &Tz, instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(tz)
        .fixed_offset()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn localize(tz: &Tz, local: NaiveDateTime) -> Result<DateTime<Tz>, TimeError> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(value) => Ok(value),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => {
            let probe = local
                .checked_sub_signed(Duration::days(1))
                .ok_or(TimeError::OutOfRange(local))?;
            let offset_before = tz.offset_from_utc_datetime(&probe).fix();
            let utc = local
                .checked_sub_signed(Duration::seconds(i64::from(
                    offset_before.local_minus_utc(),
                )))
                .ok_or(TimeError::OutOfRange(local))?;
            Ok(tz.from_utc_datetime(&utc))
        }
    }
}
