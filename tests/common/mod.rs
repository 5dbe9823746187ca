#![allow(dead_code)]

use chrono::Duration;
use pvz_service::application::identity::IdentityService;
use pvz_service::application::pickup_point::PickupPointService;
use pvz_service::application::transaction::TransactionCoordinator;
use pvz_service::domain::Role;
use pvz_service::domain::ports::{PasswordHasherRef, TokenIssuerRef};
use pvz_service::infrastructure::hasher::Argon2Hasher;
use pvz_service::infrastructure::in_memory::InMemoryStore;
use pvz_service::infrastructure::token::JwtIssuer;
use pvz_service::interfaces::http::{AppState, router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const SECRET: &str = "integration-secret";
pub const CITY: &str = "Казань";

pub fn cities() -> Vec<String> {
    vec!["Москва".to_owned(), "Санкт-Петербург".to_owned(), CITY.to_owned()]
}

pub fn tokens() -> TokenIssuerRef {
    Arc::new(JwtIssuer::new(SECRET, Duration::hours(1)))
}

pub fn hasher() -> PasswordHasherRef {
    Arc::new(Argon2Hasher::new())
}

/// Services sharing one in-memory store.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub coordinator: TransactionCoordinator<InMemoryStore>,
    pub pickup_points: Arc<PickupPointService<InMemoryStore>>,
    pub identity: Arc<IdentityService<InMemoryStore>>,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let coordinator = TransactionCoordinator::new(Arc::clone(&store));
    let pickup_points = PickupPointService::new(
        coordinator.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        cities(),
    );
    let identity = IdentityService::new(
        coordinator.clone(),
        store.clone(),
        hasher(),
        tokens(),
        Role::ALL.to_vec(),
    );

    Harness {
        store,
        coordinator,
        pickup_points: Arc::new(pickup_points),
        identity: Arc::new(identity),
    }
}

pub fn app() -> axum::Router {
    router(AppState::assemble(
        Arc::new(InMemoryStore::new()),
        hasher(),
        tokens(),
        cities(),
        Role::ALL.to_vec(),
        CancellationToken::new(),
    ))
}
