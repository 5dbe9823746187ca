//! Domain model of the pickup-point service.
//!
//! Entities are plain data with the state-transition rules that belong to
//! them. Everything that touches storage or cryptography goes through the
//! traits in [`ports`].

pub mod ports;
pub mod product;
pub mod pvz;
pub mod reception;
pub mod user;

pub use product::{Product, ProductId};
pub use pvz::{Page, Pvz, PvzId, PvzInfo, ReceptionInfo, TimeRange};
pub use reception::{Reception, ReceptionId, ReceptionStatus};
pub use user::{Principal, Role, User, UserId};
