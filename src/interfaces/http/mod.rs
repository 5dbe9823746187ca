//! REST adapter over the identity and pickup-point services.

pub mod auth;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;

use crate::application::identity::IdentityService;
use crate::application::pickup_point::PickupPointService;
use crate::application::transaction::{TransactionCoordinator, TxContext};
use crate::domain::Role;
use crate::metrics;
use crate::domain::ports::{
    PasswordHasherRef, ProductRepository, PvzRepository, ReceptionRepository, TokenIssuerRef,
    TxManager, UserRepository,
};
use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared state of every request handler.
pub struct AppState<M: TxManager> {
    pub identity: Arc<IdentityService<M>>,
    pub pickup_points: Arc<PickupPointService<M>>,
    pub tokens: TokenIssuerRef,
    /// Cancelled on shutdown; every request context is a child of it.
    pub shutdown: CancellationToken,
}

impl<M: TxManager> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            pickup_points: Arc::clone(&self.pickup_points),
            tokens: Arc::clone(&self.tokens),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<M> AppState<M>
where
    M: TxManager
        + UserRepository<M::Tx>
        + PvzRepository<M::Tx>
        + ReceptionRepository<M::Tx>
        + ProductRepository<M::Tx>
        + 'static,
{
    /// Wires both services over a store that implements every gateway.
    pub fn assemble(
        store: Arc<M>,
        hasher: PasswordHasherRef,
        tokens: TokenIssuerRef,
        cities: Vec<String>,
        dummy_roles: Vec<Role>,
        shutdown: CancellationToken,
    ) -> Self {
        let coordinator = TransactionCoordinator::new(Arc::clone(&store));
        let identity = IdentityService::new(
            coordinator.clone(),
            store.clone(),
            hasher,
            Arc::clone(&tokens),
            dummy_roles,
        );
        let pickup_points =
            PickupPointService::new(coordinator, store.clone(), store.clone(), store, cities);

        Self {
            identity: Arc::new(identity),
            pickup_points: Arc::new(pickup_points),
            tokens,
            shutdown,
        }
    }
}

impl<M: TxManager> AppState<M> {
    /// A fresh request context tied to server shutdown.
    pub fn context(&self) -> TxContext<M::Tx> {
        TxContext::with_cancellation(self.shutdown.child_token())
    }
}

pub fn router<M: TxManager + 'static>(state: AppState<M>) -> Router {
    let protected = Router::new()
        .route(
            "/pvz",
            post(handlers::create_pvz::<M>).get(handlers::get_pvz_info::<M>),
        )
        .route("/pvz/list", get(handlers::get_pvz_list::<M>))
        .route("/receptions", post(handlers::start_reception::<M>))
        .route("/products", post(handlers::add_product::<M>))
        .route(
            "/pvz/{pvz_id}/delete_last_product",
            post(handlers::delete_last_product::<M>),
        )
        .route(
            "/pvz/{pvz_id}/close_last_reception",
            post(handlers::close_last_reception::<M>),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.tokens),
            auth::authenticate,
        ));

    Router::new()
        .route("/dummyLogin", post(handlers::dummy_login::<M>))
        .route("/register", post(handlers::register::<M>))
        .route("/login", post(handlers::login::<M>))
        .merge(protected)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Logs and meters every request, labelled by its route template.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    metrics::observe_request(method.as_str(), &path, elapsed);
    debug!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "handled request"
    );
    response
}
