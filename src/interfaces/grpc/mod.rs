//! gRPC adapter exposing the pickup-point listing.

pub mod error;

pub mod proto {
    tonic::include_proto!("pvz.v1");
}

use crate::application::pickup_point::PickupPointService;
use crate::application::transaction::TxContext;
use crate::domain::Pvz;
use crate::domain::ports::TxManager;
use crate::metrics;
use proto::pvz_service_server::{PvzService, PvzServiceServer};
use proto::{GetPvzListRequest, GetPvzListResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

impl From<Pvz> for proto::Pvz {
    fn from(pvz: Pvz) -> Self {
        Self {
            id: pvz.id.to_string(),
            registration_date: Some(SystemTime::from(pvz.registered_at).into()),
            city: pvz.city,
        }
    }
}

/// Read-only RPC surface over [`PickupPointService`].
pub struct PvzRpc<M: TxManager> {
    pickup_points: Arc<PickupPointService<M>>,
    shutdown: CancellationToken,
}

impl<M: TxManager> PvzRpc<M> {
    pub fn new(pickup_points: Arc<PickupPointService<M>>, shutdown: CancellationToken) -> Self {
        Self {
            pickup_points,
            shutdown,
        }
    }
}

#[tonic::async_trait]
impl<M: TxManager + 'static> PvzService for PvzRpc<M> {
    async fn get_pvz_list(
        &self,
        _request: Request<GetPvzListRequest>,
    ) -> Result<Response<GetPvzListResponse>, Status> {
        let started = Instant::now();
        let mut ctx = TxContext::with_cancellation(self.shutdown.child_token());
        let outcome = self
            .pickup_points
            .get_pvz_list(&mut ctx)
            .await
            .map_err(error::status_from);

        debug!(
            method = "GetPVZList",
            code = ?outcome.as_ref().err().map(Status::code),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "handled rpc"
        );

        let pvzs = outcome?;
        Ok(Response::new(GetPvzListResponse {
            pvzs: pvzs.into_iter().map(Into::into).collect(),
        }))
    }
}

type CountCalls = fn(Request<()>) -> Result<Request<()>, Status>;

fn count_calls(request: Request<()>) -> Result<Request<()>, Status> {
    metrics::count_request();
    Ok(request)
}

/// The RPC service with every call counted.
pub fn service<M: TxManager + 'static>(
    pickup_points: Arc<PickupPointService<M>>,
    shutdown: CancellationToken,
) -> InterceptedService<PvzServiceServer<PvzRpc<M>>, CountCalls> {
    PvzServiceServer::with_interceptor(
        PvzRpc::new(pickup_points, shutdown),
        count_calls as CountCalls,
    )
}

/// Serves the RPC surface on `addr` until `shutdown` is cancelled.
pub async fn serve<M: TxManager + 'static>(
    addr: SocketAddr,
    pickup_points: Arc<PickupPointService<M>>,
    shutdown: CancellationToken,
) -> Result<(), tonic::transport::Error> {
    info!(address = %addr, "rpc listening");
    let stop = shutdown.clone();
    Server::builder()
        .add_service(service(pickup_points, shutdown))
        .serve_with_shutdown(addr, async move { stop.cancelled().await })
        .await
}
