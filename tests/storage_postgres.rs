//! PostgreSQL gateway tests against a throwaway container.
//!
//! Run with: cargo test --test storage_postgres --features storage-postgres

mod common;

use chrono::{Duration, Utc};
use common::{CITY, cities};
use futures::FutureExt;
use futures::future::join_all;
use pvz_service::application::pickup_point::PickupPointService;
use pvz_service::application::transaction::{TransactionCoordinator, TxContext};
use pvz_service::domain::ports::{ReceptionRepository, TxManager, UserRepository};
use pvz_service::domain::{Page, PvzId, ReceptionStatus, Role, TimeRange};
use pvz_service::error::{Error, ErrorKind, StoreError};
use pvz_service::infrastructure::postgres::PostgresStore;
use std::collections::HashSet;
use std::sync::Arc;
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

async fn start_postgres() -> (ContainerAsync<GenericImage>, String) {
    // The ready line is printed once by the init run and again by the real
    // server, hence the short pause after the wait.
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stdout(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", "pvz")
        .with_env_var("POSTGRES_PASSWORD", "pvz")
        .with_env_var("POSTGRES_DB", "pvz")
        .with_startup_timeout(std::time::Duration::from_secs(60))
        .start()
        .await
        .expect("failed to start postgres container");

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("mapped port");
    (container, format!("postgres://pvz:pvz@{host}:{port}/pvz"))
}

struct PgHarness {
    // Keeps the container alive for the duration of the test.
    _container: ContainerAsync<GenericImage>,
    store: Arc<PostgresStore>,
    coordinator: TransactionCoordinator<PostgresStore>,
    pickup_points: Arc<PickupPointService<PostgresStore>>,
}

async fn pg_harness() -> PgHarness {
    let (container, url) = start_postgres().await;
    let store = Arc::new(PostgresStore::connect(&url, 5).await.unwrap());
    let coordinator = TransactionCoordinator::new(Arc::clone(&store));
    let pickup_points = PickupPointService::new(
        coordinator.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        cities(),
    );
    PgHarness {
        _container: container,
        store,
        coordinator,
        pickup_points: Arc::new(pickup_points),
    }
}

fn everything() -> TimeRange {
    TimeRange::new(Utc::now() - Duration::days(1), Utc::now() + Duration::days(1))
}

#[tokio::test]
async fn test_concurrent_starts_open_exactly_one_reception() {
    let h = pg_harness().await;
    let mut ctx = TxContext::new();
    let pvz = h.pickup_points.create_pvz(&mut ctx, CITY).await.unwrap();

    let attempts = (0..8).map(|_| {
        let service = Arc::clone(&h.pickup_points);
        tokio::spawn(async move {
            let mut ctx = TxContext::new();
            service.start_reception(&mut ctx, pvz.id).await
        })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| err.kind() == ErrorKind::AlreadyOpen)
    );
}

#[tokio::test]
async fn test_products_are_deleted_newest_first() {
    let h = pg_harness().await;
    let mut ctx = TxContext::new();
    let pvz = h.pickup_points.create_pvz(&mut ctx, CITY).await.unwrap();
    h.pickup_points
        .start_reception(&mut ctx, pvz.id)
        .await
        .unwrap();

    let mut added = Vec::new();
    for product_type in ["electronics", "clothes", "shoes"] {
        let product = h
            .pickup_points
            .add_product(&mut ctx, pvz.id, product_type)
            .await
            .unwrap();
        added.push(product.id);
    }

    for expected in added.iter().rev() {
        let removed = h
            .pickup_points
            .delete_last_product(&mut ctx, pvz.id)
            .await
            .unwrap();
        assert_eq!(removed.id, *expected);
    }
    let err = h
        .pickup_points
        .delete_last_product(&mut ctx, pvz.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReceptionEmpty);
}

#[tokio::test]
async fn test_concurrent_deletes_remove_distinct_products() {
    let h = pg_harness().await;
    let mut ctx = TxContext::new();
    let pvz = h.pickup_points.create_pvz(&mut ctx, CITY).await.unwrap();
    h.pickup_points
        .start_reception(&mut ctx, pvz.id)
        .await
        .unwrap();
    for _ in 0..4 {
        h.pickup_points
            .add_product(&mut ctx, pvz.id, "shoes")
            .await
            .unwrap();
    }

    let attempts = (0..6).map(|_| {
        let service = Arc::clone(&h.pickup_points);
        tokio::spawn(async move {
            let mut ctx = TxContext::new();
            service.delete_last_product(&mut ctx, pvz.id).await
        })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let removed: HashSet<_> = outcomes
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|p| p.id)
        .collect();
    assert_eq!(removed.len(), 4);
    assert!(
        outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| err.kind() == ErrorKind::ReceptionEmpty)
    );
}

#[tokio::test]
async fn test_close_waits_for_in_flight_product() {
    let h = pg_harness().await;
    let mut ctx = TxContext::new();
    let pvz = h.pickup_points.create_pvz(&mut ctx, CITY).await.unwrap();
    h.pickup_points
        .start_reception(&mut ctx, pvz.id)
        .await
        .unwrap();

    let adds = (0..6).map(|_| {
        let service = Arc::clone(&h.pickup_points);
        tokio::spawn(async move {
            let mut ctx = TxContext::new();
            service.add_product(&mut ctx, pvz.id, "electronics").await
        })
    });
    let close = {
        let service = Arc::clone(&h.pickup_points);
        tokio::spawn(async move {
            let mut ctx = TxContext::new();
            service.close_reception(&mut ctx, pvz.id).await
        })
    };
    let added: Vec<_> = join_all(adds)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let closed = close.await.unwrap().unwrap();
    assert_eq!(closed.status, ReceptionStatus::Closed);

    let accepted = added.iter().filter(|r| r.is_ok()).count();
    assert!(
        added
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| err.kind() == ErrorKind::AllReceptionsClosed)
    );

    let infos = h
        .pickup_points
        .get_pvz_info(&mut ctx, everything(), Page::new(0, 10))
        .await
        .unwrap();
    assert_eq!(infos[0].receptions[0].products.len(), accepted);
}

#[tokio::test]
async fn test_failed_unit_of_work_rolls_back() {
    let h = pg_harness().await;
    let mut ctx = TxContext::new();

    let service = Arc::clone(&h.pickup_points);
    let err = h
        .coordinator
        .run(&mut ctx, move |ctx| {
            async move {
                let pvz = service.create_pvz(ctx, CITY).await?;
                service.start_reception(ctx, pvz.id).await?;
                service.add_product(ctx, pvz.id, "shoes").await?;
                Err::<(), _>(Error::Internal("abort after writes".to_owned()))
            }
            .boxed()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));

    assert!(
        h.pickup_points
            .get_pvz_list(&mut ctx)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_constraint_violations_map_to_store_errors() {
    let h = pg_harness().await;

    let mut tx = h.store.begin().await.unwrap();
    assert_eq!(
        h.store
            .create_reception(&mut tx, PvzId::new_v4())
            .await
            .unwrap_err(),
        StoreError::NotFound
    );
    h.store.rollback(tx).await.unwrap();

    let mut tx = h.store.begin().await.unwrap();
    h.store
        .create_user(&mut tx, "clerk@pvz.example", "digest", Role::Employee)
        .await
        .unwrap();
    assert_eq!(
        h.store
            .create_user(&mut tx, "clerk@pvz.example", "other", Role::Moderator)
            .await
            .unwrap_err(),
        StoreError::AlreadyExists
    );
    h.store.rollback(tx).await.unwrap();
}

#[tokio::test]
async fn test_reception_window_is_newest_first() {
    let h = pg_harness().await;
    let mut ctx = TxContext::new();
    let pvz = h.pickup_points.create_pvz(&mut ctx, CITY).await.unwrap();

    for _ in 0..3 {
        h.pickup_points
            .start_reception(&mut ctx, pvz.id)
            .await
            .unwrap();
        h.pickup_points
            .close_reception(&mut ctx, pvz.id)
            .await
            .unwrap();
    }

    let infos = h
        .pickup_points
        .get_pvz_info(&mut ctx, everything(), Page::new(0, 10))
        .await
        .unwrap();
    let started: Vec<_> = infos[0]
        .receptions
        .iter()
        .map(|r| r.reception.started_at)
        .collect();
    assert_eq!(started.len(), 3);
    assert!(started.windows(2).all(|w| w[0] >= w[1]));
}
