//! Integration tests for the redemption cycle against a SQLite store.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use mealticket_core::storage::kv::{LAST_RESET_KEY, STUDENTS_KEY};
use mealticket_core::{
    Config, Coordinate, DailyResetScheduler, DateFormats, FixedClock, Geofence, KvStore,
    RedeemOutcome, ResetOutcome, SqliteStore, StaticLocationSource, StudentRegistry,
    TicketService, TicketStatus,
};

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

const ANCHOR: Coordinate = Coordinate::new(-27.618306, -48.662846);

#[test]
fn test_fence_scenario_at_anchor_and_north() {
    let fence = Geofence::new(ANCHOR, 50.0);

    let here = fence.evaluate(ANCHOR);
    assert_eq!(here.distance_meters, 0.0);
    assert!(here.within_radius);

    let north = fence.evaluate(Coordinate::new(ANCHOR.latitude + 0.001, ANCHOR.longitude));
    assert!((north.distance_meters - 111.2).abs() < 1.0);
    assert!(!north.within_radius);
}

#[test]
fn test_daily_reset_scenario() {
    let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open_memory().unwrap());
    store
        .set(
            STUDENTS_KEY,
            r#"[{"id":"1","name":"Ana","code":"123456","used":true,"date":"25/09/2025","time":"15:00:00"}]"#,
        )
        .unwrap();
    store.set(LAST_RESET_KEY, "24/09/2025").unwrap();

    let registry = StudentRegistry::load(Arc::clone(&store)).unwrap();
    let scheduler = DailyResetScheduler::new(Arc::clone(&store), DateFormats::default());

    // Same day as the redemption: the record survives.
    scheduler.run(&registry, &at(25, 8, 0)).unwrap();
    let record = registry.find_by_id("1").unwrap();
    assert!(record.used);
    assert_eq!(record.date.as_deref(), Some("25/09/2025"));
    assert_eq!(record.time.as_deref(), Some("15:00:00"));

    let outcome = scheduler.run(&registry, &at(26, 8, 0)).unwrap();
    assert!(matches!(outcome, ResetOutcome::Swept { cleared: 1, .. }));
    let record = registry.find_by_id("1").unwrap();
    assert!(!record.used);
    assert!(record.date.is_none());
    assert!(record.time.is_none());
    assert_eq!(store.get(LAST_RESET_KEY).unwrap().as_deref(), Some("26/09/2025"));

    // The durable copy agrees with memory.
    let reloaded = StudentRegistry::load(store).unwrap();
    assert!(!reloaded.find_by_id("1").unwrap().used);
}

#[test]
fn test_redemption_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mealticket.db");
    let config = Config::default();

    let id = {
        let store = Arc::new(SqliteStore::open_at(&db_path).unwrap());
        let svc = TicketService::open(&config, store, Arc::new(FixedClock::new(at(25, 15, 0))))
            .unwrap();
        svc.check_location_once(&StaticLocationSource::new(ANCHOR))
            .unwrap();
        let student = svc.register("Ana", "123456").unwrap();
        assert!(svc.attempt_redeem(&student.id).unwrap().is_redeemed());
        student.id
    };

    // Same day, new process: still redeemed, nothing cleared.
    let store = Arc::new(SqliteStore::open_at(&db_path).unwrap());
    let svc = TicketService::open(&config, store, Arc::new(FixedClock::new(at(25, 15, 10))))
        .unwrap();
    assert!(matches!(svc.startup_reset(), ResetOutcome::UpToDate { .. }));
    assert_eq!(svc.ticket_status(&id).unwrap(), TicketStatus::RedeemedToday);
    assert!(matches!(
        svc.attempt_redeem_at(&id, at(25, 15, 10), true).unwrap(),
        RedeemOutcome::AlreadyRedeemedToday { .. }
    ));

    // Next day: the startup check reopens the ticket.
    let store = Arc::new(SqliteStore::open_at(&db_path).unwrap());
    let svc = TicketService::open(&config, store, Arc::new(FixedClock::new(at(26, 15, 0))))
        .unwrap();
    assert!(matches!(
        svc.startup_reset(),
        ResetOutcome::Swept { cleared: 1, .. }
    ));
    assert_eq!(svc.ticket_status(&id).unwrap(), TicketStatus::NotReceived);
    assert!(svc
        .attempt_redeem_at(&id, at(26, 15, 0), true)
        .unwrap()
        .is_redeemed());
}

#[test]
fn test_duplicate_codes_login_first_match() {
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let svc = TicketService::open(
        &Config::default(),
        store,
        Arc::new(FixedClock::new(at(25, 9, 0))),
    )
    .unwrap();
    let first = svc.register("Ana", "555555").unwrap();
    let _second = svc.register("Bia", "555555").unwrap();
    assert_eq!(svc.find_by_code("555555").unwrap().id, first.id);
    assert!(svc.find_by_code("000000").is_none());
}
