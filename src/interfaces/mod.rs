//! Transport adapters over the application services.

#[cfg(feature = "grpc")]
pub mod grpc;
pub mod http;
