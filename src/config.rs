use crate::domain::Role;
use chrono::Duration;
use clap::Parser;
use miette::Diagnostic;
use std::net::SocketAddr;
use thiserror::Error;

/// Invalid startup configuration.
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("secret key must not be empty")]
    #[diagnostic(code(pvz::config::secret_key), help("set --secret-key or SECRET_KEY"))]
    EmptySecretKey,

    #[error("at least one city must be allowed")]
    #[diagnostic(code(pvz::config::cities))]
    NoCities,

    #[error("unknown dummy-login role: {0}")]
    #[diagnostic(
        code(pvz::config::dummy_roles),
        help("accepted roles are `employee` and `moderator`")
    )]
    UnknownRole(String),

    #[error("token lifetime of {0} seconds is out of range")]
    #[diagnostic(code(pvz::config::token_ttl))]
    TokenTtlOutOfRange(i64),

    #[error("--database-url requires a build with the `storage-postgres` feature")]
    #[diagnostic(code(pvz::config::database_url))]
    PostgresUnavailable,

    #[error("--grpc-addr requires a build with the `grpc` feature")]
    #[diagnostic(code(pvz::config::grpc_addr))]
    GrpcUnavailable,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Pickup-point reception service", long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "PVZ_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// Address the gRPC server binds to. Disabled when unset.
    #[arg(long, env = "PVZ_GRPC_ADDR")]
    pub grpc_addr: Option<SocketAddr>,

    /// Address serving Prometheus metrics at /metrics. Disabled when unset.
    #[arg(long, env = "PVZ_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// PostgreSQL connection URL. Without it an in-memory store is used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum size of the database connection pool
    #[arg(long, env = "PVZ_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Key used to sign access tokens
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Lifetime of issued access tokens, in seconds
    #[arg(
        long,
        env = "PVZ_TOKEN_TTL_SECS",
        default_value_t = 86_400,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub token_ttl_secs: i64,

    /// Cities in which pickup points may be opened
    #[arg(
        long,
        env = "PVZ_CITIES",
        value_delimiter = ',',
        default_values = ["Москва", "Санкт-Петербург", "Казань"]
    )]
    pub cities: Vec<String>,

    /// Roles accepted by /dummyLogin
    #[arg(
        long,
        env = "PVZ_DUMMY_ROLES",
        value_delimiter = ',',
        default_values = ["employee", "moderator"]
    )]
    pub dummy_roles: Vec<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "PVZ_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// Checks the values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::EmptySecretKey);
        }
        if self.cities().is_empty() {
            return Err(ConfigError::NoCities);
        }
        self.roles()?;
        self.token_ttl()?;
        if self.database_url.is_some() && !cfg!(feature = "storage-postgres") {
            return Err(ConfigError::PostgresUnavailable);
        }
        if self.grpc_addr.is_some() && !cfg!(feature = "grpc") {
            return Err(ConfigError::GrpcUnavailable);
        }
        Ok(())
    }

    /// Allowed cities, trimmed, blanks dropped.
    pub fn cities(&self) -> Vec<String> {
        self.cities
            .iter()
            .map(|city| city.trim())
            .filter(|city| !city.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn roles(&self) -> Result<Vec<Role>, ConfigError> {
        self.dummy_roles
            .iter()
            .map(|role| {
                role.trim()
                    .parse::<Role>()
                    .map_err(|_| ConfigError::UnknownRole(role.clone()))
            })
            .collect()
    }

    pub fn token_ttl(&self) -> Result<Duration, ConfigError> {
        Duration::try_seconds(self.token_ttl_secs)
            .ok_or(ConfigError::TokenTtlOutOfRange(self.token_ttl_secs))
    }
}
