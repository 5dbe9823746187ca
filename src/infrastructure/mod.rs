//! Adapters implementing the domain ports.

pub mod hasher;
pub mod in_memory;
#[cfg(feature = "storage-postgres")]
pub mod postgres;
pub mod token;
