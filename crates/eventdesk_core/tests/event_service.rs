use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use eventdesk_core::config::ConcurrencySettings;
use eventdesk_core::db::open_db_in_memory;
use eventdesk_core::{
    EventInput, EventService, EventServiceError, EventStatus, EventStore, EventType,
    EventVisibility, FixedClock, InMemoryEventStore, LocationMatch, PageRequest, Precondition,
    RulesPolicy, SearchParams, SqliteEventStore, TimeRange,
};

fn local(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn input(title: &str, location: Option<&str>, start: NaiveDateTime, end: NaiveDateTime) -> EventInput {
    EventInput {
        title: title.to_string(),
        description: None,
        location: location.map(str::to_string),
        event_type: EventType::Rehearsal,
        status: None,
        visibility: EventVisibility::Public,
        local_start: start,
        local_end: end,
        time_zone: "Europe/Madrid".to_string(),
    }
}

fn june(title: &str, location: Option<&str>, start_hour: u32, end_hour: u32) -> EventInput {
    input(title, location, local(6, 1, start_hour), local(6, 1, end_hour))
}

fn strict_policy() -> RulesPolicy {
    RulesPolicy {
        min_duration_minutes: 15,
        max_duration_hours: 4,
        allow_overlap_same_location: false,
        allow_create_in_past: false,
    }
}

fn may_first() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap())
}

fn memory_service(policy: RulesPolicy) -> EventService<InMemoryEventStore> {
    EventService::new(InMemoryEventStore::new(), policy).with_clock(may_first())
}

fn rule_of(err: EventServiceError) -> &'static str {
    err.rule_tag()
        .unwrap_or_else(|| panic!("expected validation error, got {err}"))
}

fn overlap_and_precondition_scenario<S: EventStore>(service: &EventService<S>) {
    let a = service
        .create_event(&june("A", Some("Main Hall"), 10, 12))
        .unwrap();
    assert_eq!(a.version, 0);
    assert_eq!(a.start_at, Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap());

    let err = service
        .create_event(&june("B", Some("Main Hall"), 11, 13))
        .unwrap_err();
    assert_eq!(rule_of(err), "location_overlap");

    let err = service
        .update_event(
            a.id,
            &june("A renamed", Some("Main Hall"), 10, 12),
            Some(Precondition::Version(5)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EventServiceError::PreconditionFailed {
            expected: 5,
            current: 0
        }
    ));
    assert_eq!(service.get_event(a.id).unwrap().title, "A");

    let updated = service
        .update_event(
            a.id,
            &june("A renamed", Some("Main Hall"), 10, 12),
            Some(Precondition::Version(0)),
        )
        .unwrap();
    assert_eq!(updated.version, 1);
    assert_eq!(updated.title, "A renamed");
}

#[test]
fn scenario_on_memory_store() {
    overlap_and_precondition_scenario(&memory_service(strict_policy()));
}

#[test]
fn scenario_on_sqlite_store() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEventStore::try_new(&conn).unwrap();
    let service = EventService::new(store, strict_policy()).with_clock(may_first());
    overlap_and_precondition_scenario(&service);
}

#[test]
fn static_rules_reject_in_order() {
    let service = memory_service(strict_policy());

    let err = service.create_event(&june("Backwards", None, 12, 10)).unwrap_err();
    assert_eq!(rule_of(err), "ordering");

    let short = input("Blip", None, local(6, 1, 10), local(6, 1, 10) + chrono::Duration::minutes(10));
    assert_eq!(rule_of(service.create_event(&short).unwrap_err()), "duration_too_short");

    let err = service.create_event(&june("Marathon", None, 8, 13)).unwrap_err();
    assert_eq!(rule_of(err), "duration_too_long");

    let past = input("Past", None, local(4, 1, 10), local(4, 1, 11));
    assert_eq!(rule_of(service.create_event(&past).unwrap_err()), "past_creation");
}

#[test]
fn touching_canceled_and_blank_location_do_not_conflict() {
    let service = memory_service(strict_policy());
    service
        .create_event(&june("First", Some("Hall"), 10, 12))
        .unwrap();

    service
        .create_event(&june("Touching", Some("Hall"), 12, 13))
        .unwrap();

    let mut canceled = june("Canceled", Some("Annex"), 10, 12);
    canceled.status = Some(EventStatus::Canceled);
    service.create_event(&canceled).unwrap();
    service
        .create_event(&june("Over canceled", Some("Annex"), 10, 12))
        .unwrap();

    service.create_event(&june("Nowhere 1", Some("  "), 10, 12)).unwrap();
    service.create_event(&june("Nowhere 2", None, 10, 12)).unwrap();
}

#[test]
fn overlap_policy_toggle_allows_double_booking() {
    let mut policy = strict_policy();
    policy.allow_overlap_same_location = true;
    let service = memory_service(policy);

    service.create_event(&june("One", Some("Hall"), 10, 12)).unwrap();
    service.create_event(&june("Two", Some("Hall"), 10, 12)).unwrap();
}

#[test]
fn update_rechecks_conflicts_against_others() {
    let service = memory_service(strict_policy());
    service.create_event(&june("Morning", Some("Hall"), 9, 11)).unwrap();
    let afternoon = service
        .create_event(&june("Afternoon", Some("Hall"), 14, 16))
        .unwrap();

    let err = service
        .update_event(
            afternoon.id,
            &june("Afternoon", Some("Hall"), 10, 12),
            Some(Precondition::Version(0)),
        )
        .unwrap_err();
    assert_eq!(rule_of(err), "location_overlap");
    assert_eq!(service.get_event(afternoon.id).unwrap().version, 0);
}

#[test]
fn omitted_status_on_update_keeps_stored_status() {
    let service = memory_service(RulesPolicy::default());
    let mut create = june("Gig", None, 20, 22);
    create.status = Some(EventStatus::Postponed);
    let created = service.create_event(&create).unwrap();

    let updated = service
        .update_event(created.id, &june("Gig moved", None, 21, 23), Some(Precondition::Any))
        .unwrap();
    assert_eq!(updated.status, EventStatus::Postponed);
    assert_eq!(updated.version, 1);
}

#[test]
fn update_of_missing_event_is_not_found() {
    let service = memory_service(RulesPolicy::default());
    let id = uuid::Uuid::new_v4();
    let err = service
        .update_event(id, &june("Ghost", None, 10, 11), Some(Precondition::Version(0)))
        .unwrap_err();
    assert!(matches!(err, EventServiceError::NotFound(missing) if missing == id));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn delete_requires_current_precondition() {
    let service = memory_service(RulesPolicy::default());
    let created = service.create_event(&june("Gig", None, 20, 22)).unwrap();

    assert!(matches!(
        service.delete_event(created.id, None),
        Err(EventServiceError::PreconditionRequired)
    ));
    assert!(matches!(
        service.delete_event(created.id, Some(Precondition::Version(1))),
        Err(EventServiceError::PreconditionFailed { current: 0, .. })
    ));

    service
        .delete_event(created.id, Some(Precondition::Any))
        .unwrap();
    assert!(matches!(
        service.get_event(created.id),
        Err(EventServiceError::NotFound(_))
    ));
}

#[test]
fn optional_precondition_allows_blind_writes() {
    let service = memory_service(RulesPolicy::default()).with_concurrency(ConcurrencySettings {
        require_precondition: false,
    });
    let created = service.create_event(&june("Gig", None, 20, 22)).unwrap();

    let updated = service
        .update_event(created.id, &june("Gig", None, 19, 22), None)
        .unwrap();
    assert_eq!(updated.version, 1);
    service.delete_event(created.id, None).unwrap();
}

#[test]
fn search_filters_intersect() {
    let service = memory_service(RulesPolicy::default());
    let mut concert = june("Spring Concert", Some("Main Hall"), 19, 21);
    concert.event_type = EventType::Concert;
    concert.description = Some("Brass and percussion".to_string());
    service.create_event(&concert).unwrap();

    let mut meeting = june("Board meeting", Some("Office"), 9, 10);
    meeting.event_type = EventType::Meeting;
    meeting.visibility = EventVisibility::Private;
    service.create_event(&meeting).unwrap();

    service
        .create_event(&june("Sectional", Some("Main Hall Annex"), 11, 12))
        .unwrap();

    let everything = service
        .search(&SearchParams::default(), PageRequest::default())
        .unwrap();
    assert_eq!(everything.total_elements, 3);
    assert_eq!(everything.size, 20);

    let exact = service
        .search(
            &SearchParams {
                location: Some("Main Hall".to_string()),
                location_match: LocationMatch::Exact,
                ..SearchParams::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    assert_eq!(exact.items.len(), 1);
    assert_eq!(exact.items[0].title, "Spring Concert");

    let contains = service
        .search(
            &SearchParams {
                location: Some("main hall".to_string()),
                ..SearchParams::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    assert_eq!(contains.total_elements, 2);

    let text = service
        .search(
            &SearchParams {
                q: Some("PERCUSSION".to_string()),
                ..SearchParams::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    assert_eq!(text.total_elements, 1);

    let disjoint = service
        .search(
            &SearchParams {
                event_type: Some(EventType::Meeting),
                visibility: Some(EventVisibility::Public),
                ..SearchParams::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    assert!(disjoint.items.is_empty());
    assert_eq!(disjoint.total_pages, 0);
}

#[test]
fn page_size_is_clamped_to_maximum() {
    let service = memory_service(RulesPolicy::default());
    let page = service
        .search(&SearchParams::default(), PageRequest::new(0, 5_000))
        .unwrap();
    assert_eq!(page.size, 100);
}

#[test]
fn list_past_defaults_to_clock_and_latest_first() {
    let service = memory_service(RulesPolicy::default());
    service
        .create_event(&input("Early April", None, local(4, 2, 10), local(4, 2, 11)))
        .unwrap();
    service
        .create_event(&input("Late April", None, local(4, 20, 10), local(4, 20, 11)))
        .unwrap();
    service.create_event(&june("Upcoming", None, 10, 11)).unwrap();

    let past = service.list_past(None, PageRequest::default()).unwrap();
    let titles: Vec<_> = past.items.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Late April", "Early April"]);
}

#[test]
fn calendar_renders_requested_zone_and_filters_public() {
    let service = memory_service(RulesPolicy::default());
    service.create_event(&june("Open rehearsal", None, 10, 12)).unwrap();
    let mut private = june("Closed rehearsal", None, 14, 16);
    private.visibility = EventVisibility::Private;
    service.create_event(&private).unwrap();

    let from = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

    let all = service
        .calendar_between(from, to, Some("America/New_York"), PageRequest::default())
        .unwrap();
    assert_eq!(all.total_elements, 2);
    assert_eq!(
        all.items[0].start_local.as_deref(),
        Some("2025-06-01T04:00:00-04:00")
    );
    assert!(!all.items[0].all_day);

    let public = service
        .public_calendar_between(from, to, Some(" "), PageRequest::default())
        .unwrap();
    assert_eq!(public.items.len(), 1);
    assert_eq!(public.items[0].title, "Open rehearsal");
    assert!(public.items[0].start_local.is_none());

    let err = service
        .calendar_between(from, to, Some("Nowhere/City"), PageRequest::default())
        .unwrap_err();
    assert_eq!(rule_of(err), "invalid_time_zone");
}

fn madrid_june_first(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour - 2, 0, 0).unwrap()
}

fn seed_search_fixture<S: EventStore>(service: &EventService<S>) {
    let mut rehearsal = june("Ensayo General", Some("Sala Principal"), 10, 12);
    rehearsal.description = Some("Repaso completo".to_string());
    service.create_event(&rehearsal).unwrap();

    let mut session = june("Sesión ÉPICA", Some("Auditorio"), 12, 14);
    session.description = Some("Sesión de grabación".to_string());
    service.create_event(&session).unwrap();

    let mut concert = june("Concierto", Some("Sala Principal Anexo"), 18, 21);
    concert.event_type = EventType::Concert;
    service.create_event(&concert).unwrap();
}

fn search_cases() -> Vec<(SearchParams, Vec<&'static str>)> {
    let text = |q: &str| SearchParams {
        q: Some(q.to_string()),
        ..SearchParams::default()
    };
    let range = |time_range: TimeRange| SearchParams {
        time_range: Some(time_range),
        ..SearchParams::default()
    };
    let h = madrid_june_first;

    vec![
        (text("épica"), vec!["Sesión ÉPICA"]),
        (text("ENSAYO"), vec!["Ensayo General"]),
        (
            SearchParams {
                title: Some("sesión épica".to_string()),
                ..SearchParams::default()
            },
            vec!["Sesión ÉPICA"],
        ),
        (
            SearchParams {
                description: Some("SESIÓN".to_string()),
                ..SearchParams::default()
            },
            vec!["Sesión ÉPICA"],
        ),
        (
            SearchParams {
                location: Some("SALA principal".to_string()),
                ..SearchParams::default()
            },
            vec!["Ensayo General", "Concierto"],
        ),
        (
            SearchParams {
                location: Some("Sala Principal".to_string()),
                location_match: LocationMatch::Exact,
                ..SearchParams::default()
            },
            vec!["Ensayo General"],
        ),
        // Upper bound only: an event starting exactly at `to` is outside.
        (
            range(TimeRange::Overlap {
                from: None,
                to: Some(h(12)),
            }),
            vec!["Ensayo General"],
        ),
        // Lower bound only: an event ending exactly at `from` is outside.
        (
            range(TimeRange::Overlap {
                from: Some(h(12)),
                to: None,
            }),
            vec!["Sesión ÉPICA", "Concierto"],
        ),
        (
            range(TimeRange::Overlap {
                from: Some(h(11)),
                to: Some(h(13)),
            }),
            vec!["Ensayo General", "Sesión ÉPICA"],
        ),
        (
            range(TimeRange::Overlap {
                from: Some(h(14)),
                to: Some(h(18)),
            }),
            vec![],
        ),
        (
            range(TimeRange::Within {
                from: h(12),
                to: h(14),
            }),
            vec!["Sesión ÉPICA"],
        ),
        (
            range(TimeRange::Within {
                from: h(12),
                to: h(13),
            }),
            vec![],
        ),
        (
            SearchParams {
                location: Some("sala".to_string()),
                event_type: Some(EventType::Concert),
                time_range: Some(TimeRange::Within {
                    from: h(9),
                    to: h(22),
                }),
                ..SearchParams::default()
            },
            vec!["Concierto"],
        ),
    ]
}

fn titles<S: EventStore>(service: &EventService<S>, params: &SearchParams) -> Vec<String> {
    service
        .search(params, PageRequest::default())
        .unwrap()
        .items
        .into_iter()
        .map(|event| event.title)
        .collect()
}

#[test]
fn search_modes_agree_across_stores() {
    let memory = memory_service(RulesPolicy::default());
    let conn = open_db_in_memory().unwrap();
    let sqlite = EventService::new(SqliteEventStore::try_new(&conn).unwrap(), RulesPolicy::default())
        .with_clock(may_first());
    seed_search_fixture(&memory);
    seed_search_fixture(&sqlite);

    for (params, expected) in search_cases() {
        let expected: Vec<String> = expected.into_iter().map(str::to_string).collect();
        assert_eq!(titles(&memory, &params), expected, "memory store: {params:?}");
        assert_eq!(titles(&sqlite, &params), expected, "sqlite store: {params:?}");
    }
}

#[test]
fn write_without_read_back_is_inconsistent_state() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TEMP TRIGGER discard_new_event AFTER INSERT ON events
         BEGIN
            DELETE FROM events WHERE id = NEW.id;
         END;",
    )
    .unwrap();
    let service = EventService::new(SqliteEventStore::try_new(&conn).unwrap(), RulesPolicy::default())
        .with_clock(may_first());

    let err = service.create_event(&june("Ghost", None, 10, 11)).unwrap_err();
    assert!(matches!(err, EventServiceError::InconsistentState(_)), "{err}");
    assert_eq!(err.status_code(), 500);
}
