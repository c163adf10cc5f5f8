//! Composable event search filters.
//!
//! # Responsibility
//! - Turn optional search parameters into one conjunctive filter.
//! - Evaluate that filter against in-memory events.
//!
//! # Invariants
//! - Absent or blank parameters contribute no clause.
//! - Clauses are AND-combined; their order never changes the result.
//! - Text matching is substring-based and Unicode case-insensitive. Both
//!   stores fold through `fold_case`; SQLite reaches it as the `fold_case`
//!   SQL function registered on every store connection.

use crate::model::event::{Event, EventStatus, EventType, EventVisibility};
use chrono::{DateTime, Utc};

/// How the `location` parameter is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationMatch {
    Exact,
    #[default]
    Contains,
}

/// Time-window constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// Events intersecting the window; a missing bound is unbounded.
    Overlap {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// Events lying completely inside the window.
    Within {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Independently-optional search parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Free text matched across title, description and location.
    pub q: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub location_match: LocationMatch,
    pub time_zone: Option<String>,
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub visibility: Option<EventVisibility>,
    pub time_range: Option<TimeRange>,
}

/// One AND-ed constraint. Text needles are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    Text(String),
    TitleContains(String),
    DescriptionContains(String),
    LocationEquals(String),
    LocationContains(String),
    TimeZoneEquals(String),
    TypeEquals(EventType),
    StatusEquals(EventStatus),
    VisibilityEquals(EventVisibility),
    Overlaps {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    Within {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// `from <= start_at <= to`.
    StartsBetween {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// `end_at < before`.
    EndsBefore(DateTime<Utc>),
}

impl FilterClause {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::Text(needle) => {
                contains_folded(Some(event.title.as_str()), needle)
                    || contains_folded(event.description.as_deref(), needle)
                    || contains_folded(event.location.as_deref(), needle)
            }
            Self::TitleContains(needle) => contains_folded(Some(event.title.as_str()), needle),
            Self::DescriptionContains(needle) => {
                contains_folded(event.description.as_deref(), needle)
            }
            Self::LocationEquals(value) => event.location.as_deref() == Some(value.as_str()),
            Self::LocationContains(needle) => contains_folded(event.location.as_deref(), needle),
            Self::TimeZoneEquals(value) => event.time_zone == *value,
            Self::TypeEquals(kind) => event.event_type == *kind,
            Self::StatusEquals(status) => event.status == *status,
            Self::VisibilityEquals(visibility) => event.visibility == *visibility,
            Self::Overlaps { from, to } => {
                to.map_or(true, |to| event.start_at < to)
                    && from.map_or(true, |from| event.end_at > from)
            }
            Self::Within { from, to } => event.start_at >= *from && event.end_at <= *to,
            Self::StartsBetween { from, to } => event.start_at >= *from && event.start_at <= *to,
            Self::EndsBefore(before) => event.end_at < *before,
        }
    }
}

/// Conjunction of clauses. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    clauses: Vec<FilterClause>,
}

impl EventFilter {
    /// Identity filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a clause.
    pub fn with(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Adds a clause when present; `None` is the identity.
    pub fn and(mut self, clause: Option<FilterClause>) -> Self {
        if let Some(clause) = clause {
            self.clauses.push(clause);
        }
        self
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.clauses.iter().all(|clause| clause.matches(event))
    }
}

/// Builds the combined filter for a search request.
pub fn compose(params: &SearchParams) -> EventFilter {
    let location = non_blank(params.location.as_deref()).map(|value| match params.location_match {
        LocationMatch::Exact => FilterClause::LocationEquals(value.to_string()),
        LocationMatch::Contains => FilterClause::LocationContains(fold_case(value)),
    });

    EventFilter::all()
        .and(folded(params.q.as_deref()).map(FilterClause::Text))
        .and(folded(params.title.as_deref()).map(FilterClause::TitleContains))
        .and(folded(params.description.as_deref()).map(FilterClause::DescriptionContains))
        .and(location)
        .and(
            non_blank(params.time_zone.as_deref())
                .map(|value| FilterClause::TimeZoneEquals(value.to_string())),
        )
        .and(params.event_type.map(FilterClause::TypeEquals))
        .and(params.status.map(FilterClause::StatusEquals))
        .and(params.visibility.map(FilterClause::VisibilityEquals))
        .and(params.time_range.and_then(time_range_clause))
}

fn time_range_clause(range: TimeRange) -> Option<FilterClause> {
    match range {
        TimeRange::Overlap {
            from: None,
            to: None,
        } => None,
        TimeRange::Overlap { from, to } => Some(FilterClause::Overlaps { from, to }),
        TimeRange::Within { from, to } => Some(FilterClause::Within { from, to }),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Case fold applied to needles and haystacks alike.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

fn folded(value: Option<&str>) -> Option<String> {
    non_blank(value).map(fold_case)
}

fn contains_folded(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| fold_case(value).contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{compose, FilterClause, LocationMatch, SearchParams, TimeRange};
    use crate::model::event::{Event, EventDraft, EventStatus, EventType, EventVisibility};
    use chrono::{TimeZone, Utc};

    #[test]
    fn empty_params_compose_to_identity() {
        assert!(compose(&SearchParams::default()).is_unconstrained());
    }

    #[test]
    fn blank_strings_and_unbounded_overlap_add_no_clause() {
        let params = SearchParams {
            q: Some("   ".to_string()),
            title: Some(String::new()),
            location: Some(" ".to_string()),
            time_range: Some(TimeRange::Overlap {
                from: None,
                to: None,
            }),
            ..SearchParams::default()
        };
        assert!(compose(&params).is_unconstrained());
    }

    #[test]
    fn text_needles_are_trimmed_and_lowercased() {
        let params = SearchParams {
            q: Some("  JaZZ ".to_string()),
            ..SearchParams::default()
        };
        assert_eq!(
            compose(&params).clauses(),
            &[FilterClause::Text("jazz".to_string())]
        );
    }

    #[test]
    fn location_match_mode_selects_clause() {
        let mut params = SearchParams {
            location: Some("Main Hall".to_string()),
            ..SearchParams::default()
        };
        assert_eq!(
            compose(&params).clauses(),
            &[FilterClause::LocationContains("main hall".to_string())]
        );

        params.location_match = LocationMatch::Exact;
        assert_eq!(
            compose(&params).clauses(),
            &[FilterClause::LocationEquals("Main Hall".to_string())]
        );
    }

    #[test]
    fn every_supplied_parameter_contributes_one_clause() {
        let from = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();
        let params = SearchParams {
            q: Some("spring".to_string()),
            title: Some("concert".to_string()),
            description: Some("brass".to_string()),
            location: Some("hall".to_string()),
            location_match: LocationMatch::Contains,
            time_zone: Some("Europe/Madrid".to_string()),
            event_type: Some(EventType::Concert),
            status: Some(EventStatus::Scheduled),
            visibility: None,
            time_range: Some(TimeRange::Within { from, to }),
        };
        assert_eq!(compose(&params).clauses().len(), 9);
    }

    #[test]
    fn accented_text_matches_regardless_of_case() {
        let event = Event::from_draft(&EventDraft {
            title: "Sesión ÉPICA".to_string(),
            description: Some("Grabación en directo".to_string()),
            location: Some("Auditorio Ñuñoa".to_string()),
            event_type: EventType::Rehearsal,
            status: None,
            visibility: EventVisibility::Public,
            time_zone: "Europe/Madrid".to_string(),
            start_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        });

        let searches = [
            SearchParams {
                q: Some("épica".to_string()),
                ..SearchParams::default()
            },
            SearchParams {
                description: Some("GRABACIÓN".to_string()),
                ..SearchParams::default()
            },
            SearchParams {
                location: Some("auditorio ñuñoa".to_string()),
                ..SearchParams::default()
            },
        ];
        for params in &searches {
            assert!(compose(params).matches(&event), "{params:?}");
        }
    }
}
