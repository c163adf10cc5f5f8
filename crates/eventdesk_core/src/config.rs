//! Runtime configuration for the event core.
//!
//! # Responsibility
//! - Deserialize `eventdesk.toml` into typed sections.
//! - Reject settings that would make the rule engine incoherent.
//!
//! # Invariants
//! - Every field has a default; an empty document is a valid config.
//! - A config returned by `from_toml_str`/`load` has passed `validate`.

use crate::rules::{RulesPolicy, MAX_DURATION_HOURS_LIMIT};
use crate::search::page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub rules: RulesPolicy,
    pub concurrency: ConcurrencySettings,
    pub search: SearchSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Update/delete without a version precondition are refused when set.
    pub require_precondition: bool,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            require_precondition: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file. An in-memory database is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid config `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl EventsConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.rules;
        if rules.min_duration_minutes < 1 {
            return Err(invalid("rules.min_duration_minutes", "must be at least 1"));
        }
        if rules.max_duration_hours < 1 || rules.max_duration_hours > MAX_DURATION_HOURS_LIMIT {
            return Err(invalid(
                "rules.max_duration_hours",
                format!("must be within 1..={MAX_DURATION_HOURS_LIMIT}"),
            ));
        }
        if i64::from(rules.min_duration_minutes) > rules.max_duration_minutes() {
            return Err(invalid(
                "rules.min_duration_minutes",
                "must not exceed max_duration_hours * 60",
            ));
        }

        let search = &self.search;
        if search.default_page_size < 1 {
            return Err(invalid("search.default_page_size", "must be at least 1"));
        }
        if search.max_page_size < 1 {
            return Err(invalid("search.max_page_size", "must be at least 1"));
        }
        if search.default_page_size > search.max_page_size {
            return Err(invalid(
                "search.default_page_size",
                "must not exceed search.max_page_size",
            ));
        }

        if let Some(dir) = self.logging.dir.as_deref() {
            if !dir.is_absolute() {
                return Err(invalid("logging.dir", "must be an absolute path"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
