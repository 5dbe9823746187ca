use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pvz_service::config::Config;
use pvz_service::domain::ports::{
    PasswordHasherRef, ProductRepository, PvzRepository, ReceptionRepository, TokenIssuerRef,
    TxManager, UserRepository,
};
use pvz_service::infrastructure::hasher::Argon2Hasher;
use pvz_service::infrastructure::in_memory::InMemoryStore;
use pvz_service::infrastructure::token::JwtIssuer;
use pvz_service::interfaces::http::{AppState, router};
use pvz_service::{metrics, telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;
    telemetry::init_tracing(config.log_json);

    // Installed before any service builds its counters.
    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr).into_diagnostic()?;
    }

    let hasher: PasswordHasherRef = Arc::new(Argon2Hasher::new());
    let tokens: TokenIssuerRef = Arc::new(JwtIssuer::new(&config.secret_key, config.token_ttl()?));

    match config.database_url.as_deref() {
        #[cfg(feature = "storage-postgres")]
        Some(url) => {
            use pvz_service::infrastructure::postgres::PostgresStore;

            let store = PostgresStore::connect(url, config.max_connections)
                .await
                .into_diagnostic()?;
            serve(&config, Arc::new(store), hasher, tokens).await
        }
        _ => {
            info!("using in-memory store");
            serve(&config, Arc::new(InMemoryStore::new()), hasher, tokens).await
        }
    }
}

/// Runs every configured listener over `store` until Ctrl-C.
async fn serve<M>(
    config: &Config,
    store: Arc<M>,
    hasher: PasswordHasherRef,
    tokens: TokenIssuerRef,
) -> Result<()>
where
    M: TxManager
        + UserRepository<M::Tx>
        + PvzRepository<M::Tx>
        + ReceptionRepository<M::Tx>
        + ProductRepository<M::Tx>
        + 'static,
{
    let shutdown = CancellationToken::new();
    let state = AppState::assemble(
        store,
        hasher,
        tokens,
        config.cities(),
        config.roles()?,
        shutdown.clone(),
    );

    #[cfg(feature = "grpc")]
    let rpc = config.grpc_addr.map(|addr| {
        tokio::spawn(pvz_service::interfaces::grpc::serve(
            addr,
            Arc::clone(&state.pickup_points),
            shutdown.clone(),
        ))
    });

    let listener = TcpListener::bind(config.http_addr).await.into_diagnostic()?;
    info!(address = %listener.local_addr().into_diagnostic()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .into_diagnostic()?;

    #[cfg(feature = "grpc")]
    if let Some(rpc) = rpc {
        shutdown.cancel();
        rpc.await.into_diagnostic()?.into_diagnostic()?;
    }

    info!("server stopped");
    Ok(())
}

/// Waits for Ctrl-C, then cancels every in-flight unit of work.
async fn shutdown_signal(shutdown: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
    }
    shutdown.cancel();
}
