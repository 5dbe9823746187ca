//! Application layer containing the business rules.
//!
//! Both services are stateless apart from their injected collaborators. Every
//! operation runs as a unit of work through the
//! [`TransactionCoordinator`](transaction::TransactionCoordinator), so
//! concurrent requests only meet inside the storage engine.

pub mod identity;
pub mod pickup_point;
pub mod transaction;
