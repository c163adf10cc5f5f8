//! Event use-case service.
//!
//! # Responsibility
//! - Validate, convert and rule-check candidate events before any write.
//! - Run conflict checks, precondition checks and the write as one
//!   serialized store transaction.
//! - Provide search, range listing and calendar projections.
//!
//! # Invariants
//! - Update is full replacement; an omitted status keeps the stored one.
//! - Every rejected mutation leaves the store unchanged.
//! - Log lines carry ids, versions and outcomes only, never titles or
//!   descriptions.

use crate::clock::{Clock, SystemClock};
use crate::concurrency::{check_precondition, Precondition};
use crate::config::{ConcurrencySettings, EventsConfig, SearchSettings};
use crate::conflict::check_location_conflicts;
use crate::model::event::{Event, EventDraft, EventId, EventInput, EventVisibility};
use crate::model::view::CalendarEventItem;
use crate::repo::event_repo::EventStore;
use crate::rules::{self, RulesPolicy};
use crate::search::filter::{compose, EventFilter, FilterClause, SearchParams, TimeRange};
use crate::search::page::{Page, PageRequest, Sort, SortKey};
use crate::service::error::{EventServiceError, ValidationError};
use crate::timezone::{resolve_zone, to_instant};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{info, warn};
use std::time::Instant;

pub type ServiceResult<T> = Result<T, EventServiceError>;

/// Event service facade over an [`EventStore`].
pub struct EventService<S: EventStore> {
    store: S,
    policy: RulesPolicy,
    concurrency: ConcurrencySettings,
    search: SearchSettings,
    clock: Box<dyn Clock>,
}

impl<S: EventStore> EventService<S> {
    /// Creates a service with default concurrency/search settings and the
    /// system clock.
    pub fn new(store: S, policy: RulesPolicy) -> Self {
        Self {
            store,
            policy,
            concurrency: ConcurrencySettings::default(),
            search: SearchSettings::default(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn from_config(store: S, config: &EventsConfig) -> Self {
        Self {
            store,
            policy: config.rules,
            concurrency: config.concurrency,
            search: config.search,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the time source used for past-creation checks.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_concurrency(mut self, concurrency: ConcurrencySettings) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn policy(&self) -> &RulesPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates one event at version 0.
    pub fn create_event(&self, input: &EventInput) -> ServiceResult<Event> {
        let started_at = Instant::now();
        let result = self.create_event_inner(input);
        match &result {
            Ok(event) => info!(
                "event=event_create module=service status=ok event_id={} version={} duration_ms={}",
                event.id,
                event.version,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_rejection("event_create", None, err, started_at),
        }
        result
    }

    fn create_event_inner(&self, input: &EventInput) -> ServiceResult<Event> {
        let draft = prepare_draft(input)?;
        rules::validate(&draft, &self.policy, self.clock.now())?;
        let candidate = Event::from_draft(&draft);

        self.store.in_write_transaction(|store| -> ServiceResult<Event> {
            if let Some(violation) =
                check_location_conflicts(store, &self.policy, &candidate, None)?
            {
                return Err(violation.into());
            }
            Ok(store.insert(&candidate)?)
        })
    }

    /// Replaces all mutable fields of one event.
    ///
    /// Checks run in this order: precondition presence, existence, version
    /// match, field/time validation, rules, location conflicts (excluding
    /// the event itself), then a CAS write that advances the version.
    pub fn update_event(
        &self,
        id: EventId,
        input: &EventInput,
        precondition: Option<Precondition>,
    ) -> ServiceResult<Event> {
        let started_at = Instant::now();
        let result = self.update_event_inner(id, input, precondition);
        match &result {
            Ok(event) => info!(
                "event=event_update module=service status=ok event_id={} version={} duration_ms={}",
                event.id,
                event.version,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_rejection("event_update", Some(id), err, started_at),
        }
        result
    }

    fn update_event_inner(
        &self,
        id: EventId,
        input: &EventInput,
        precondition: Option<Precondition>,
    ) -> ServiceResult<Event> {
        self.ensure_precondition_present(precondition)?;

        self.store.in_write_transaction(|store| -> ServiceResult<Event> {
            let current = store
                .find_by_id(id)?
                .ok_or(EventServiceError::NotFound(id))?;
            check_precondition(
                precondition,
                current.version,
                self.concurrency.require_precondition,
            )?;

            let draft = prepare_draft(input)?;
            rules::validate(&draft, &self.policy, self.clock.now())?;

            let mut candidate = current.clone();
            candidate.apply_draft(&draft);
            if let Some(violation) =
                check_location_conflicts(store, &self.policy, &candidate, Some(id))?
            {
                return Err(violation.into());
            }

            Ok(store.update_if_version(&candidate, current.version)?)
        })
    }

    /// Hard-deletes one event under the version precondition.
    pub fn delete_event(
        &self,
        id: EventId,
        precondition: Option<Precondition>,
    ) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = self.delete_event_inner(id, precondition);
        match &result {
            Ok(()) => info!(
                "event=event_delete module=service status=ok event_id={} duration_ms={}",
                id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_rejection("event_delete", Some(id), err, started_at),
        }
        result
    }

    fn delete_event_inner(
        &self,
        id: EventId,
        precondition: Option<Precondition>,
    ) -> ServiceResult<()> {
        self.ensure_precondition_present(precondition)?;

        self.store.in_write_transaction(|store| -> ServiceResult<()> {
            let current = store
                .find_by_id(id)?
                .ok_or(EventServiceError::NotFound(id))?;
            check_precondition(
                precondition,
                current.version,
                self.concurrency.require_precondition,
            )?;
            Ok(store.delete_if_version(id, Some(current.version))?)
        })
    }

    pub fn get_event(&self, id: EventId) -> ServiceResult<Event> {
        self.store
            .find_by_id(id)?
            .ok_or(EventServiceError::NotFound(id))
    }

    /// Multi-field search. Unsorted pages default to `start_at` ascending.
    pub fn search(&self, params: &SearchParams, page: PageRequest) -> ServiceResult<Page<Event>> {
        if let Some(range) = params.time_range {
            match range {
                TimeRange::Overlap {
                    from: Some(from),
                    to: Some(to),
                }
                | TimeRange::Within { from, to } => ensure_range(from, to)?,
                TimeRange::Overlap { .. } => {}
            }
        }

        let filter = compose(params);
        self.run_query(&filter, page, Sort::asc(SortKey::StartAt))
    }

    /// Events starting within `[from, to]`.
    pub fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: PageRequest,
    ) -> ServiceResult<Page<Event>> {
        ensure_range(from, to)?;
        let filter = EventFilter::all().with(FilterClause::StartsBetween { from, to });
        self.run_query(&filter, page, Sort::asc(SortKey::StartAt))
    }

    /// Events that ended before `before` (default: now), latest first.
    pub fn list_past(
        &self,
        before: Option<DateTime<Utc>>,
        page: PageRequest,
    ) -> ServiceResult<Page<Event>> {
        let before = before.unwrap_or_else(|| self.clock.now());
        let filter = EventFilter::all().with(FilterClause::EndsBefore(before));
        self.run_query(&filter, page, Sort::desc(SortKey::EndAt))
    }

    /// Calendar projection of events starting within `[from, to]`.
    ///
    /// A non-blank `time_zone` adds local renderings in that zone.
    pub fn calendar_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        time_zone: Option<&str>,
        page: PageRequest,
    ) -> ServiceResult<Page<CalendarEventItem>> {
        self.calendar(from, to, time_zone, None, page)
    }

    /// Same as [`EventService::calendar_between`], public events only.
    pub fn public_calendar_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        time_zone: Option<&str>,
        page: PageRequest,
    ) -> ServiceResult<Page<CalendarEventItem>> {
        self.calendar(from, to, time_zone, Some(EventVisibility::Public), page)
    }

    fn calendar(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        time_zone: Option<&str>,
        visibility: Option<EventVisibility>,
        page: PageRequest,
    ) -> ServiceResult<Page<CalendarEventItem>> {
        let zone = display_zone(time_zone)?;
        ensure_range(from, to)?;

        let filter = EventFilter::all()
            .and(visibility.map(FilterClause::VisibilityEquals))
            .with(FilterClause::StartsBetween { from, to });
        let events = self.run_query(&filter, page, Sort::asc(SortKey::StartAt))?;
        Ok(events.map(|event| CalendarEventItem::from_event(&event, zone.as_ref())))
    }

    fn run_query(
        &self,
        filter: &EventFilter,
        page: PageRequest,
        fallback: Sort,
    ) -> ServiceResult<Page<Event>> {
        let page = page.normalized(
            self.search.default_page_size,
            self.search.max_page_size,
            fallback,
        );
        Ok(self.store.query(filter, &page)?)
    }

    fn ensure_precondition_present(
        &self,
        precondition: Option<Precondition>,
    ) -> ServiceResult<()> {
        if precondition.is_none() && self.concurrency.require_precondition {
            return Err(EventServiceError::PreconditionRequired);
        }
        Ok(())
    }
}

/// Field bounds, then local-to-UTC conversion of both ends.
fn prepare_draft(input: &EventInput) -> ServiceResult<EventDraft> {
    input.validate_fields()?;
    let start_at = to_instant(input.local_start, &input.time_zone)?;
    let end_at = to_instant(input.local_end, &input.time_zone)?;
    Ok(EventDraft::from_input(input, start_at, end_at))
}

fn ensure_range(from: DateTime<Utc>, to: DateTime<Utc>) -> ServiceResult<()> {
    if from > to {
        return Err(ValidationError::InvalidRange { from, to }.into());
    }
    Ok(())
}

fn display_zone(time_zone: Option<&str>) -> ServiceResult<Option<Tz>> {
    match time_zone.map(str::trim).filter(|value| !value.is_empty()) {
        Some(zone_id) => Ok(Some(resolve_zone(zone_id)?)),
        None => Ok(None),
    }
}

fn log_rejection(
    operation: &str,
    id: Option<EventId>,
    err: &EventServiceError,
    started_at: Instant,
) {
    let event_id = id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let duration_ms = started_at.elapsed().as_millis();
    match err {
        EventServiceError::Store(_) | EventServiceError::InconsistentState(_) => warn!(
            "event={operation} module=service status=error event_id={event_id} status_code={} duration_ms={duration_ms} error={err}",
            err.status_code()
        ),
        _ => info!(
            "event={operation} module=service status=rejected event_id={event_id} status_code={} rule={} duration_ms={duration_ms}",
            err.status_code(),
            err.rule_tag().unwrap_or("-")
        ),
    }
}
