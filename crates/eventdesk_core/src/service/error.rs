//! Service-level error taxonomy.
//!
//! # Responsibility
//! - Fold field, time, rule, precondition and store failures into one error.
//! - Classify every error into a stable kind with a transport status hint.
//!
//! # Invariants
//! - Validation errors always expose a machine-readable `rule_tag`.
//! - Store failures are never re-labelled as validation or not-found,
//!   except the two store outcomes that carry that meaning (`NotFound`,
//!   `VersionMismatch`).

use crate::concurrency::PreconditionError;
use crate::model::event::{EventId, FieldViolation, Version};
use crate::repo::event_repo::RepoError;
use crate::rules::RuleViolation;
use crate::timezone::TimeError;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Input rejected before or during rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Field(FieldViolation),
    Time(TimeError),
    /// Range query whose lower bound is after its upper bound.
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    Rule(RuleViolation),
}

impl ValidationError {
    pub fn rule_tag(&self) -> &'static str {
        match self {
            Self::Field(violation) => violation.rule_tag(),
            Self::Time(err) => err.rule_tag(),
            Self::InvalidRange { .. } => "invalid_range",
            Self::Rule(violation) => violation.rule_tag(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(violation) => write!(f, "{violation}"),
            Self::Time(err) => write!(f, "{err}"),
            Self::InvalidRange { from, to } => {
                write!(f, "invalid range: `from` {from} is after `to` {to}")
            }
            Self::Rule(violation) => write!(f, "{violation}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(violation) => Some(violation),
            Self::Time(err) => Some(err),
            Self::InvalidRange { .. } => None,
            Self::Rule(violation) => Some(violation),
        }
    }
}

/// Coarse classification of service errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    PreconditionRequired,
    Conflict,
    Infrastructure,
}

/// Service error for event use-cases.
#[derive(Debug)]
pub enum EventServiceError {
    NotFound(EventId),
    Validation(ValidationError),
    /// Mutation needs a version precondition and none was supplied.
    PreconditionRequired,
    MalformedPrecondition(String),
    /// Supplied version is stale.
    PreconditionFailed { expected: Version, current: Version },
    Store(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl EventServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::PreconditionRequired | Self::MalformedPrecondition(_) => {
                ErrorKind::PreconditionRequired
            }
            Self::PreconditionFailed { .. } => ErrorKind::Conflict,
            Self::Store(_) | Self::InconsistentState(_) => ErrorKind::Infrastructure,
        }
    }

    /// HTTP-style status for transports that want one.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::PreconditionRequired => 428,
            ErrorKind::Conflict => 412,
            ErrorKind::Infrastructure => 500,
        }
    }

    /// Rule tag for validation errors, `None` otherwise.
    pub fn rule_tag(&self) -> Option<&'static str> {
        match self {
            Self::Validation(err) => Some(err.rule_tag()),
            _ => None,
        }
    }
}

impl Display for EventServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::PreconditionRequired => {
                write!(f, "precondition required: supply the current version")
            }
            Self::MalformedPrecondition(raw) => write!(f, "malformed precondition `{raw}`"),
            Self::PreconditionFailed { expected, current } => write!(
                f,
                "precondition failed: expected version {expected}, current version {current}"
            ),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent event state: {details}"),
        }
    }
}

impl Error for EventServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EventServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::VersionMismatch {
                expected, current, ..
            } => Self::PreconditionFailed { expected, current },
            RepoError::MissingAfterWrite(_) => Self::InconsistentState("event missing after write"),
            other => Self::Store(other),
        }
    }
}

impl From<PreconditionError> for EventServiceError {
    fn from(value: PreconditionError) -> Self {
        match value {
            PreconditionError::Required => Self::PreconditionRequired,
            PreconditionError::Malformed(raw) => Self::MalformedPrecondition(raw),
            PreconditionError::Failed { expected, current } => {
                Self::PreconditionFailed { expected, current }
            }
        }
    }
}

impl From<ValidationError> for EventServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RuleViolation> for EventServiceError {
    fn from(value: RuleViolation) -> Self {
        Self::Validation(ValidationError::Rule(value))
    }
}

impl From<TimeError> for EventServiceError {
    fn from(value: TimeError) -> Self {
        Self::Validation(ValidationError::Time(value))
    }
}

impl From<FieldViolation> for EventServiceError {
    fn from(value: FieldViolation) -> Self {
        Self::Validation(ValidationError::Field(value))
    }
}
