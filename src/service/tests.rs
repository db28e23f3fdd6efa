use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use super::*;
use crate::store::{InMemoryStore, StoreError, WalStore};

fn input(start: &str, end: &str, status: &str) -> RangeInput {
    RangeInput {
        start_date: Some(start.into()),
        end_date: Some(end.into()),
        status: Some(status.into()),
        ..RangeInput::default()
    }
}

fn season_input(start: &str, end: &str, pct: f64) -> SeasonInput {
    SeasonInput {
        start_date: Some(start.into()),
        end_date: Some(end.into()),
        percentage: Some(json!(pct)),
        ..SeasonInput::default()
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn setup() -> (AvailabilityService, Ulid, Requester) {
    setup_with(ServiceOptions::default()).await
}

async fn setup_with(options: ServiceOptions) -> (AvailabilityService, Ulid, Requester) {
    let service = AvailabilityService::new(Arc::new(InMemoryStore::new()), options);
    let owner = Requester::user(Ulid::new());
    let property = service
        .register_property(&owner, NewProperty::default())
        .await
        .unwrap();
    (service, property.id, owner)
}

/// Store whose writes can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    fail_writes: AtomicBool,
}

#[async_trait]
impl PropertyStore for FlakyStore {
    async fn load_property(&self, id: Ulid) -> Result<Option<Property>, StoreError> {
        self.inner.load_property(id).await
    }

    async fn insert_property(&self, property: Property) -> Result<(), StoreError> {
        self.inner.insert_property(property).await
    }

    async fn save_property(&self, id: Ulid, update: PropertyUpdate) -> Result<Property, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Wal("disk full".into()));
        }
        self.inner.save_property(id, update).await
    }

    fn property_count(&self) -> usize {
        self.inner.property_count()
    }

    fn active_property_count(&self) -> usize {
        self.inner.active_property_count()
    }
}

// ── Scenarios ────────────────────────────────────────────

#[tokio::test]
async fn first_range_on_empty_property() {
    let (service, pid, owner) = setup().await;
    let property = service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    assert_eq!(property.availability.len(), 1);
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::Disponible));
}

#[tokio::test]
async fn overlapping_insert_is_rejected_and_ledger_unchanged() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    let before = service.get_availability(pid).await.unwrap();

    let result = service
        .add_range(pid, &owner, input("2024-06-05", "2024-06-08", "reservado_temp"))
        .await;
    assert!(matches!(result, Err(AvailabilityError::OverlapConflict { .. })));
    let result = service
        .add_range(pid, &owner, input("2024-06-10", "2024-06-15", "reservado_temp"))
        .await;
    assert!(matches!(result, Err(AvailabilityError::OverlapConflict { .. })));

    assert_eq!(service.get_availability(pid).await.unwrap(), before);
}

#[tokio::test]
async fn booked_insert_then_delete_restores_disponible() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    let property = service
        .add_range(pid, &owner, input("2024-07-01", "2024-07-05", "ocupado_temp"))
        .await
        .unwrap();
    assert_eq!(property.availability.len(), 2);
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::OcupadoTemp));

    let booked_id = property.availability[1].id().to_string();
    let property = service.remove_range(pid, &booked_id, &owner).await.unwrap();
    assert_eq!(property.availability.len(), 1);
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::Disponible));

    let again = service.remove_range(pid, &booked_id, &owner).await;
    assert!(matches!(again, Err(AvailabilityError::RangeNotFound(_))));
}

#[tokio::test]
async fn non_owner_is_forbidden() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    let before = service.get_availability(pid).await.unwrap();
    let stranger = Requester::user(Ulid::new());

    let result = service
        .add_range(pid, &stranger, input("2024-08-01", "2024-08-03", "reservado_temp"))
        .await;
    assert!(matches!(
        result,
        Err(AvailabilityError::Forbidden { requester_id, .. }) if requester_id == stranger.user_id
    ));
    let range_id = before.ranges[0].id().to_string();
    let result = service.remove_range(pid, &range_id, &stranger).await;
    assert!(matches!(result, Err(AvailabilityError::Forbidden { .. })));

    assert_eq!(service.get_availability(pid).await.unwrap(), before);
}

#[tokio::test]
async fn forbidden_is_checked_before_validation() {
    let (service, pid, _owner) = setup().await;
    let stranger = Requester::user(Ulid::new());
    let result = service
        .add_range(pid, &stranger, input("garbage", "2024-06-01", "disponible"))
        .await;
    assert!(matches!(result, Err(AvailabilityError::Forbidden { .. })));
}

#[tokio::test]
async fn admin_may_edit_any_property() {
    let (service, pid, _owner) = setup().await;
    let admin = Requester::admin(Ulid::new());
    let property = service
        .add_range(pid, &admin, input("2024-06-01", "2024-06-03", "reservado"))
        .await
        .unwrap();
    assert_eq!(property.availability[0].status(), RangeStatus::ReservadoTemp);
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::ReservadoTemp));
}

#[tokio::test]
async fn unknown_property_is_not_found() {
    let (service, _pid, owner) = setup().await;
    let missing = Ulid::new();
    assert!(matches!(
        service.get_availability(missing).await,
        Err(AvailabilityError::PropertyNotFound(id)) if id == missing
    ));
    assert!(matches!(
        service
            .add_range(missing, &owner, input("2024-06-01", "2024-06-03", "disponible"))
            .await,
        Err(AvailabilityError::PropertyNotFound(_))
    ));
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let (service, pid, owner) = setup().await;
    let mut no_end = input("2024-06-01", "", "disponible");
    no_end.end_date = None;
    for bad in [
        no_end,
        input("2024-06-10", "2024-06-01", "disponible"),
        input("tomorrow", "2024-06-01", "disponible"),
        input("2024-06-01", "2024-06-05", "vendido"),
    ] {
        let result = service.add_range(pid, &owner, bad).await;
        assert!(matches!(result, Err(AvailabilityError::InvalidRange(_))), "{result:?}");
    }
    assert!(service.get_availability(pid).await.unwrap().ranges.is_empty());
}

#[tokio::test]
async fn read_is_idempotent() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    let a = service.get_availability(pid).await.unwrap();
    let b = service.get_availability(pid).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn disponible_insert_keeps_booked_status() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-07-01", "2024-07-05", "ocupado_temp"))
        .await
        .unwrap();
    let property = service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::OcupadoTemp));
}

#[tokio::test]
async fn replace_range_is_one_write() {
    let (service, pid, owner) = setup().await;
    let property = service
        .add_range(pid, &owner, input("2024-07-01", "2024-07-05", "reservado_temp"))
        .await
        .unwrap();
    let old_id = property.availability[0].id().to_string();

    let property = service
        .replace_range(pid, &old_id, &owner, input("2024-07-02", "2024-07-06", "disponible"))
        .await
        .unwrap();
    assert_eq!(property.availability.len(), 1);
    assert_eq!(property.availability[0].status(), RangeStatus::Disponible);
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::Disponible));

    let result = service
        .replace_range(pid, &old_id, &owner, input("2024-08-01", "2024-08-02", "disponible"))
        .await;
    assert!(matches!(result, Err(AvailabilityError::RangeNotFound(_))));
}

#[tokio::test]
async fn client_name_policy() {
    let (service, pid, owner) = setup_with(ServiceOptions {
        require_client_name: true,
    })
    .await;
    let result = service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-03", "ocupado_temp"))
        .await;
    assert!(matches!(result, Err(AvailabilityError::InvalidRange(_))));

    // Open ranges need no client.
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-03", "disponible"))
        .await
        .unwrap();
    let mut named = input("2024-06-05", "2024-06-07", "ocupado_temp");
    named.client_name = Some("Lucía Pérez".into());
    service.add_range(pid, &owner, named).await.unwrap();
}

// ── Property lifecycle ───────────────────────────────────

#[tokio::test]
async fn register_rejects_duplicates_and_foreign_owner() {
    let (service, pid, owner) = setup().await;
    let dup = service
        .register_property(
            &owner,
            NewProperty {
                id: Some(pid),
                ..NewProperty::default()
            },
        )
        .await;
    assert!(matches!(dup, Err(AvailabilityError::AlreadyExists(id)) if id == pid));

    let other = NewProperty {
        owner_id: Some(Ulid::new()),
        ..NewProperty::default()
    };
    let result = service.register_property(&owner, other.clone()).await;
    assert!(matches!(result, Err(AvailabilityError::Forbidden { .. })));
    let admin = Requester::admin(Ulid::new());
    let registered = service.register_property(&admin, other.clone()).await.unwrap();
    assert_eq!(Some(registered.owner_id), other.owner_id);
}

#[tokio::test]
async fn deactivated_property_disappears() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    let stranger = Requester::user(Ulid::new());
    assert!(matches!(
        service.deactivate_property(pid, &stranger).await,
        Err(AvailabilityError::Forbidden { .. })
    ));

    assert_eq!(service.active_property_count(), 1);
    let property = service.deactivate_property(pid, &owner).await.unwrap();
    assert!(!property.active);
    assert_eq!(service.active_property_count(), 0);
    assert_eq!(service.property_count(), 1);
    assert!(matches!(
        service.get_availability(pid).await,
        Err(AvailabilityError::PropertyNotFound(_))
    ));
    assert!(matches!(
        service
            .add_range(pid, &owner, input("2024-08-01", "2024-08-02", "disponible"))
            .await,
        Err(AvailabilityError::PropertyNotFound(_))
    ));
    assert!(matches!(
        service.deactivate_property(pid, &owner).await,
        Err(AvailabilityError::PropertyNotFound(_))
    ));
}

#[tokio::test]
async fn availability_lists_ranges_in_insertion_order() {
    let (service, pid, owner) = setup().await;
    for (start, end) in [("2024-08-01", "2024-08-05"), ("2024-06-01", "2024-06-05"), ("2024-07-01", "2024-07-05")] {
        service
            .add_range(pid, &owner, input(start, end, "reservado_temp"))
            .await
            .unwrap();
    }
    let snapshot = service.get_availability(pid).await.unwrap();
    let starts: Vec<String> = snapshot.ranges.iter().map(|r| format_instant(r.start())).collect();
    assert_eq!(
        starts,
        vec![
            "2024-08-01T00:00:00.000Z",
            "2024-06-01T00:00:00.000Z",
            "2024-07-01T00:00:00.000Z",
        ]
    );
    assert_eq!(snapshot.status, PropertyStatus::Rental(RangeStatus::ReservadoTemp));
}

#[tokio::test]
async fn disponible_insert_replaces_listing_status() {
    let service = AvailabilityService::new(Arc::new(InMemoryStore::new()), ServiceOptions::default());
    let owner = Requester::user(Ulid::new());
    let property = service
        .register_property(
            &owner,
            NewProperty {
                status: Some(PropertyStatus::Listing("En revisión".into())),
                ..NewProperty::default()
            },
        )
        .await
        .unwrap();
    let pid = property.id;

    let property = service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    assert_eq!(property.status, PropertyStatus::Rental(RangeStatus::Disponible));
}

// ── Queries ──────────────────────────────────────────────

#[tokio::test]
async fn calendar_queries() {
    let (service, pid, owner) = setup().await;
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
    service
        .add_range(pid, &owner, input("2024-06-04T12:00:00Z", "2024-06-05T09:00:00Z", "reservado"))
        .await
        .unwrap_err();
    service
        .add_range(pid, &owner, input("2024-06-12", "2024-06-14", "reservado"))
        .await
        .unwrap();

    let view = service.calendar(pid, date("2024-06-01"), date("2024-06-15")).await.unwrap();
    assert_eq!(view.days.len(), 15);
    assert_eq!(view.open_windows, vec![(date("2024-06-01"), date("2024-06-10"))]);

    assert!(service.is_range_booked(pid, date("2024-06-13"), date("2024-06-20")).await.unwrap());
    assert!(!service.is_range_booked(pid, date("2024-06-01"), date("2024-06-11")).await.unwrap());
    assert!(service
        .is_range_fully_available(pid, date("2024-06-03"), date("2024-06-08"))
        .await
        .unwrap());
    assert!(!service
        .is_range_fully_available(pid, date("2024-06-08"), date("2024-06-11"))
        .await
        .unwrap());
    assert!(matches!(
        service.calendar(pid, date("2024-06-15"), date("2024-06-01")).await,
        Err(AvailabilityError::InvalidRange(_))
    ));
}

// ── Seasons ──────────────────────────────────────────────

#[tokio::test]
async fn seasons_lifecycle_and_quote() {
    let (service, pid, owner) = setup().await;
    let early = service
        .add_season(pid, &owner, season_input("2024-06-02", "2024-06-04", 20.0))
        .await;
    assert!(matches!(early, Err(AvailabilityError::InvalidSeason(_))));

    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-30", "disponible"))
        .await
        .unwrap();
    let property = service
        .add_season(pid, &owner, season_input("2024-06-10", "2024-06-20", 25.0))
        .await
        .unwrap();
    let season_id = property.seasonal_prices[0].id.to_string();

    let clash = service
        .add_season(pid, &owner, season_input("2024-06-20", "2024-06-25", 10.0))
        .await;
    assert!(matches!(clash, Err(AvailabilityError::SeasonOverlap(_))));

    let stranger = Requester::user(Ulid::new());
    assert!(matches!(
        service.remove_season(pid, &season_id, &stranger).await,
        Err(AvailabilityError::Forbidden { .. })
    ));

    let quote = service.quote(pid, date("2024-06-15"), Some(200.0)).await.unwrap();
    assert_eq!(quote.percentage, Some(25.0));
    assert_eq!(quote.price, 250.0);
    assert!(matches!(
        service.quote(pid, date("2024-06-15"), None).await,
        Err(AvailabilityError::InvalidSeason(_))
    ));

    service.remove_season(pid, &season_id, &owner).await.unwrap();
    assert!(service.list_seasons(pid).await.unwrap().is_empty());
    assert!(matches!(
        service.remove_season(pid, &season_id, &owner).await,
        Err(AvailabilityError::SeasonNotFound(_))
    ));
}

#[tokio::test]
async fn quote_falls_back_to_nightly_price() {
    let service = AvailabilityService::new(Arc::new(InMemoryStore::new()), ServiceOptions::default());
    let owner = Requester::user(Ulid::new());
    let property = service
        .register_property(
            &owner,
            NewProperty {
                nightly_price: Some(80.0),
                ..NewProperty::default()
            },
        )
        .await
        .unwrap();
    let quote = service.quote(property.id, date("2024-01-01"), None).await.unwrap();
    assert_eq!(quote.price, 80.0);
    assert_eq!(quote.percentage, None);
}

// ── Concurrency & storage ────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_inserts_admit_exactly_one() {
    let (service, pid, owner) = setup().await;
    let service = Arc::new(service);

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let day = 10 + (i % 3);
                let start = format!("2024-09-{day:02}");
                service
                    .add_range(pid, &owner, input(&start, "2024-09-20", "reservado_temp"))
                    .await
            })
        })
        .collect();

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AvailabilityError::OverlapConflict { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(service.get_availability(pid).await.unwrap().ranges.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_properties_proceed_independently() {
    let service = Arc::new(AvailabilityService::new(
        Arc::new(InMemoryStore::new()),
        ServiceOptions::default(),
    ));
    let owner = Requester::user(Ulid::new());
    let mut ids = Vec::new();
    for _ in 0..8 {
        ids.push(service.register_property(&owner, NewProperty::default()).await.unwrap().id);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|&pid| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .add_range(pid, &owner, input("2024-09-01", "2024-09-05", "ocupado_temp"))
                    .await
            })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }
    for pid in ids {
        let snapshot = service.get_availability(pid).await.unwrap();
        assert_eq!(snapshot.status, PropertyStatus::Rental(RangeStatus::OcupadoTemp));
    }
}

#[tokio::test]
async fn storage_failure_surfaces_and_changes_nothing() {
    let store = Arc::new(FlakyStore::default());
    let service = AvailabilityService::new(store.clone(), ServiceOptions::default());
    let owner = Requester::user(Ulid::new());
    let pid = service
        .register_property(&owner, NewProperty::default())
        .await
        .unwrap()
        .id;

    store.fail_writes.store(true, Ordering::SeqCst);
    let result = service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await;
    assert!(matches!(result, Err(AvailabilityError::Storage(_))));
    assert!(service.get_availability(pid).await.unwrap().ranges.is_empty());

    store.fail_writes.store(false, Ordering::SeqCst);
    service
        .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
        .await
        .unwrap();
}

#[tokio::test]
async fn durable_store_round_trip() {
    let dir = std::env::temp_dir().join("stayledger_test_service");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("round_trip.wal");
    let _ = std::fs::remove_file(&path);

    let owner = Requester::user(Ulid::new());
    let pid = {
        let store = Arc::new(WalStore::open(&path).unwrap());
        let service = AvailabilityService::new(store, ServiceOptions::default());
        let pid = service
            .register_property(&owner, NewProperty::default())
            .await
            .unwrap()
            .id;
        service
            .add_range(pid, &owner, input("2024-06-01", "2024-06-10", "disponible"))
            .await
            .unwrap();
        service
            .add_range(pid, &owner, input("2024-07-01", "2024-07-03", "ocupado_temp"))
            .await
            .unwrap();
        pid
    };

    let service = AvailabilityService::new(Arc::new(WalStore::open(&path).unwrap()), ServiceOptions::default());
    let snapshot = service.get_availability(pid).await.unwrap();
    assert_eq!(snapshot.ranges.len(), 2);
    assert_eq!(snapshot.status, PropertyStatus::Rental(RangeStatus::OcupadoTemp));
    let _ = std::fs::remove_file(&path);
}
