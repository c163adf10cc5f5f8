//! Optimistic concurrency primitives.
//!
//! # Responsibility
//! - Advance versions and render them as entity tags.
//! - Parse `If-Match`-style precondition headers back into versions.
//! - Decide whether a supplied precondition admits a mutation.
//!
//! # Invariants
//! - Versions only ever advance by exactly one; overflow is refused.
//! - A missing precondition and a stale precondition are distinct errors.
//! - The check itself is pure; atomicity with the write is the store's job
//!   (`UPDATE ... WHERE version = ?` inside a write transaction).

use crate::model::event::Version;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static ENTITY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:W/)?(?:"(\d+)"|(\d+))$"#).expect("valid entity tag regex")
});

/// Caller-supplied expectation about the stored version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// `If-Match: *`; any existing version is acceptable.
    Any,
    /// The caller last observed this version.
    Version(Version),
}

/// Precondition rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// Operation requires a precondition and none was supplied.
    Required,
    /// Supplied token could not be parsed.
    Malformed(String),
    /// Supplied version is stale.
    Failed { expected: Version, current: Version },
}

impl Display for PreconditionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => write!(f, "precondition required: supply the current version"),
            Self::Malformed(raw) => write!(f, "malformed precondition `{raw}`"),
            Self::Failed { expected, current } => write!(
                f,
                "precondition failed: expected version {expected}, current version {current}"
            ),
        }
    }
}

impl Error for PreconditionError {}

/// Returns the version following `current`, or `None` on overflow.
pub fn next_version(current: Version) -> Option<Version> {
    current.checked_add(1)
}

/// Checks a supplied precondition against the stored version.
///
/// `required` controls whether a missing precondition is acceptable.
pub fn check_precondition(
    supplied: Option<Precondition>,
    current: Version,
    required: bool,
) -> Result<(), PreconditionError> {
    match supplied {
        None if required => Err(PreconditionError::Required),
        None | Some(Precondition::Any) => Ok(()),
        Some(Precondition::Version(expected)) if expected == current => Ok(()),
        Some(Precondition::Version(expected)) => {
            Err(PreconditionError::Failed { expected, current })
        }
    }
}

/// Renders a version as a strong entity tag (`"3"`).
pub fn format_etag(version: Version) -> String {
    format!("\"{version}\"")
}

/// Parses an `If-Match`-style header value.
///
/// Accepts `*`, `"n"`, `W/"n"` and bare `n`. For a comma-separated list the
/// first entry is used. Absent or blank input is `Required`.
pub fn parse_if_match(header: Option<&str>) -> Result<Precondition, PreconditionError> {
    let Some(raw) = header.map(str::trim).filter(|value| !value.is_empty()) else {
        return Err(PreconditionError::Required);
    };

    let first = raw.split(',').next().map(str::trim).unwrap_or_default();
    if first == "*" {
        return Ok(Precondition::Any);
    }

    let captures = ENTITY_TAG_RE
        .captures(first)
        .ok_or_else(|| PreconditionError::Malformed(raw.to_string()))?;
    let digits = captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str())
        .ok_or_else(|| PreconditionError::Malformed(raw.to_string()))?;
    digits
        .parse::<Version>()
        .map(Precondition::Version)
        .map_err(|_| PreconditionError::Malformed(raw.to_string()))
}
