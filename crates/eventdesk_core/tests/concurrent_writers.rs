use chrono::NaiveDate;
use eventdesk_core::db::open_db;
use eventdesk_core::{
    EventId, EventInput, EventService, EventServiceError, EventType, EventVisibility, Precondition,
    RulesPolicy, SqliteEventStore,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

fn input(title: &str, location: &str, start_hour: u32) -> EventInput {
    let day = NaiveDate::from_ymd_opt(2030, 3, 14).unwrap();
    EventInput {
        title: title.to_string(),
        description: None,
        location: Some(location.to_string()),
        event_type: EventType::Rehearsal,
        status: None,
        visibility: EventVisibility::Private,
        local_start: day.and_hms_opt(start_hour, 0, 0).unwrap(),
        local_end: day.and_hms_opt(start_hour + 2, 0, 0).unwrap(),
        time_zone: "UTC".to_string(),
    }
}

fn race<T: Send + 'static>(
    path: &Path,
    racers: usize,
    op: impl Fn(&EventService<SqliteEventStore<'_>>, usize) -> Result<T, EventServiceError>
        + Send
        + Sync
        + 'static,
) -> Vec<Result<T, EventServiceError>> {
    let barrier = Arc::new(Barrier::new(racers));
    let op = Arc::new(op);
    let handles: Vec<_> = (0..racers)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let op = Arc::clone(&op);
            let path = path.to_path_buf();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let store = SqliteEventStore::try_new(&conn).unwrap();
                let service = EventService::new(store, RulesPolicy::default());
                barrier.wait();
                op(&service, index)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

fn seed(path: &Path) -> EventId {
    let conn = open_db(path).unwrap();
    let store = SqliteEventStore::try_new(&conn).unwrap();
    let service = EventService::new(store, RulesPolicy::default());
    service.create_event(&input("Seed", "Hall", 10)).unwrap().id
}

#[test]
fn concurrent_updates_with_same_version_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let id = seed(&path);

    let results = race(&path, 4, move |service, index| {
        service.update_event(
            id,
            &input(&format!("Racer {index}"), "Hall", 10),
            Some(Precondition::Version(0)),
        )
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].version, 1);
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    EventServiceError::PreconditionFailed {
                        expected: 0,
                        current: 1
                    }
                ),
                "unexpected error: {err}"
            );
        }
    }
}

#[test]
fn concurrent_creates_in_same_slot_admit_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slots.db");
    seed(&path);

    let results = race(&path, 4, |service, index| {
        service.create_event(&input(&format!("Booking {index}"), "Studio", 15))
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.rule_tag(), Some("location_overlap"));
    }
}
