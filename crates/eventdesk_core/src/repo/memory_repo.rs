//! In-memory event store.
//!
//! # Responsibility
//! - Serve tests and embedded callers without a database file.
//! - Mirror `SqliteEventStore` semantics, including CAS on `version`.
//!
//! # Invariants
//! - Every single write holds the map's write lock, so each CAS is atomic.
//! - `in_write_transaction` holds the writer mutex for the whole closure and
//!   restores the pre-closure snapshot when the closure fails.

use crate::concurrency::next_version;
use crate::conflict::ConflictQuery;
use crate::model::event::{Event, EventId, Version};
use crate::repo::event_repo::{EventStore, RepoError, RepoResult};
use crate::search::filter::EventFilter;
use crate::search::page::{Page, PageRequest, Sort, SortKey};
use chrono::{SubsecRound, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<BTreeMap<EventId, Event>>,
    writer: Mutex<()>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> RepoResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> RepoResult<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, BTreeMap<EventId, Event>>> {
        self.events
            .read()
            .map_err(|_| RepoError::Unavailable("event map lock poisoned".to_string()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, BTreeMap<EventId, Event>>> {
        self.events
            .write()
            .map_err(|_| RepoError::Unavailable("event map lock poisoned".to_string()))
    }
}

impl EventStore for InMemoryEventStore {
    fn insert(&self, event: &Event) -> RepoResult<Event> {
        let mut events = self.write()?;
        if events.contains_key(&event.id) {
            return Err(RepoError::InvalidData(format!(
                "duplicate event id {}",
                event.id
            )));
        }

        let now = Utc::now().trunc_subsecs(3);
        let mut stored = event.clone();
        stored.created_at = Some(now);
        stored.updated_at = Some(now);
        events.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn update_if_version(&self, event: &Event, expected: Version) -> RepoResult<Event> {
        let mut events = self.write()?;
        let current = events
            .get_mut(&event.id)
            .ok_or(RepoError::NotFound(event.id))?;
        if current.version != expected {
            return Err(RepoError::VersionMismatch {
                id: event.id,
                expected,
                current: current.version,
            });
        }
        let next = next_version(expected).ok_or(RepoError::VersionOverflow(event.id))?;

        let created_at = current.created_at;
        *current = event.clone();
        current.version = next;
        current.created_at = created_at;
        current.updated_at = Some(Utc::now().trunc_subsecs(3));
        Ok(current.clone())
    }

    fn delete_if_version(&self, id: EventId, expected: Option<Version>) -> RepoResult<()> {
        let mut events = self.write()?;
        let current = events.get(&id).ok_or(RepoError::NotFound(id))?;
        if let Some(expected) = expected {
            if current.version != expected {
                return Err(RepoError::VersionMismatch {
                    id,
                    expected,
                    current: current.version,
                });
            }
        }
        events.remove(&id);
        Ok(())
    }

    fn find_by_id(&self, id: EventId) -> RepoResult<Option<Event>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn exists_by_id(&self, id: EventId) -> RepoResult<bool> {
        Ok(self.read()?.contains_key(&id))
    }

    fn count_overlaps(&self, query: &ConflictQuery) -> RepoResult<u64> {
        let count = self
            .read()?
            .values()
            .filter(|existing| query.matches(existing))
            .count();
        Ok(count as u64)
    }

    fn query(&self, filter: &EventFilter, page: &PageRequest) -> RepoResult<Page<Event>> {
        let mut matched: Vec<Event> = self
            .read()?
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();

        let sort = page.sort_or(Sort::asc(SortKey::StartAt));
        matched.sort_by(|left, right| sort.compare(left, right));

        let total = matched.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matched
            .into_iter()
            .skip(offset)
            .take(page.size as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }

    fn in_write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| RepoError::Unavailable("writer lock poisoned".to_string()))?;
        let snapshot = self.read()?.clone();

        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self.write()? = snapshot;
                Err(err)
            }
        }
    }
}
