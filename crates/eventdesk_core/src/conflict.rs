//! Same-location scheduling conflict detection.
//!
//! # Responsibility
//! - Define what counts as a conflicting event for a candidate slot.
//! - Ask the store for the conflict count and turn it into a rule violation.
//!
//! # Invariants
//! - Intervals are half-open: touching slots (`end1 == start2`) never conflict.
//! - Canceled events and the excluded id (the event being updated) never count.
//! - Candidates without a non-blank location are exempt.
//! - Callers run the check inside the store write transaction that performs
//!   the write, so no concurrent writer can commit in between.

use crate::model::event::{Event, EventId};
use crate::repo::event_repo::{EventStore, RepoResult};
use crate::rules::{RuleViolation, RulesPolicy};
use chrono::{DateTime, Utc};

/// Candidate slot to count conflicts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictQuery {
    /// Exact location, already trimmed and non-blank.
    pub location: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Set on update to avoid self-conflict.
    pub exclude_id: Option<EventId>,
}

impl ConflictQuery {
    /// Builds a query, or `None` when the location is exempt.
    pub fn for_slot(
        location: Option<&str>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude_id: Option<EventId>,
    ) -> Option<Self> {
        let location = location.map(str::trim).filter(|value| !value.is_empty())?;
        Some(Self {
            location: location.to_string(),
            start_at,
            end_at,
            exclude_id,
        })
    }

    /// Returns whether a persisted event conflicts with this slot.
    pub fn matches(&self, existing: &Event) -> bool {
        existing.location.as_deref() == Some(self.location.as_str())
            && !existing.is_canceled()
            && self.exclude_id != Some(existing.id)
            && intervals_overlap(existing.start_at, existing.end_at, self.start_at, self.end_at)
    }
}

/// Half-open interval intersection: `[s1, e1)` and `[s2, e2)`.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Counts conflicts for a slot. Exempt locations count as zero.
pub fn count_conflicts<S: EventStore + ?Sized>(
    store: &S,
    location: Option<&str>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    exclude_id: Option<EventId>,
) -> RepoResult<u64> {
    match ConflictQuery::for_slot(location, start_at, end_at, exclude_id) {
        Some(query) => store.count_overlaps(&query),
        None => Ok(0),
    }
}

/// Applies the overlap policy to a candidate event.
///
/// Returns `Ok(Some(violation))` when the slot is taken, `Ok(None)` when it
/// is free or the policy allows overlaps. Store failures propagate.
pub fn check_location_conflicts<S: EventStore + ?Sized>(
    store: &S,
    policy: &RulesPolicy,
    candidate: &Event,
    exclude_id: Option<EventId>,
) -> RepoResult<Option<RuleViolation>> {
    if policy.allow_overlap_same_location {
        return Ok(None);
    }

    let conflicts = count_conflicts(
        store,
        candidate.location.as_deref(),
        candidate.start_at,
        candidate.end_at,
        exclude_id,
    )?;
    if conflicts == 0 {
        return Ok(None);
    }
    Ok(Some(RuleViolation::LocationOverlap {
        location: candidate.location.clone().unwrap_or_default(),
        conflicts,
    }))
}

#[cfg(test)]
mod tests {
    use super::{check_location_conflicts, count_conflicts, intervals_overlap, ConflictQuery};
    use crate::model::event::{Event, EventDraft, EventType, EventVisibility};
    use crate::repo::event_repo::EventStore;
    use crate::repo::memory_repo::InMemoryEventStore;
    use crate::rules::{RuleViolation, RulesPolicy};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(10), at(11), at(11), at(12)));
        assert!(!intervals_overlap(at(11), at(12), at(10), at(11)));
    }

    #[test]
    fn nested_and_partial_intervals_overlap() {
        assert!(intervals_overlap(at(10), at(14), at(11), at(12)));
        assert!(intervals_overlap(at(10), at(12), at(11), at(13)));
    }

    #[test]
    fn blank_location_is_exempt() {
        assert!(ConflictQuery::for_slot(Some("   "), at(10), at(11), None).is_none());
        assert!(ConflictQuery::for_slot(None, at(10), at(11), None).is_none());
        let query = ConflictQuery::for_slot(Some(" Hall "), at(10), at(11), None).unwrap();
        assert_eq!(query.location, "Hall");
    }

    fn booked(location: Option<&str>, start: u32, end: u32) -> Event {
        Event::from_draft(&EventDraft {
            title: "Booked".to_string(),
            description: None,
            location: location.map(str::to_string),
            event_type: EventType::Concert,
            status: None,
            visibility: EventVisibility::Public,
            time_zone: "UTC".to_string(),
            start_at: at(start),
            end_at: at(end),
        })
    }

    #[test]
    fn exempt_location_counts_zero_without_store_lookup() {
        let store = InMemoryEventStore::new();
        store.insert(&booked(Some("Hall"), 10, 12)).unwrap();
        assert_eq!(count_conflicts(&store, Some(" "), at(10), at(12), None).unwrap(), 0);
        assert_eq!(count_conflicts(&store, Some("Hall"), at(11), at(13), None).unwrap(), 1);
    }

    #[test]
    fn policy_toggle_and_self_exclusion() {
        let store = InMemoryEventStore::new();
        let existing = store.insert(&booked(Some("Hall"), 10, 12)).unwrap();
        let candidate = booked(Some("Hall"), 11, 13);

        let strict = RulesPolicy::default();
        assert_eq!(
            check_location_conflicts(&store, &strict, &candidate, None).unwrap(),
            Some(RuleViolation::LocationOverlap {
                location: "Hall".to_string(),
                conflicts: 1,
            })
        );
        assert_eq!(
            check_location_conflicts(&store, &strict, &existing, Some(existing.id)).unwrap(),
            None
        );

        let relaxed = RulesPolicy {
            allow_overlap_same_location: true,
            ..RulesPolicy::default()
        };
        assert_eq!(
            check_location_conflicts(&store, &relaxed, &candidate, None).unwrap(),
            None
        );
    }
}
