use super::product::Product;
use super::reception::Reception;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PvzId = Uuid;

/// A pickup point. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pvz {
    pub id: PvzId,
    pub city: String,
    pub registered_at: DateTime<Utc>,
}

impl Pvz {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            city: city.into(),
            registered_at: Utc::now(),
        }
    }
}

/// A reception together with the products attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionInfo {
    pub reception: Reception,
    pub products: Vec<Product>,
}

/// A pickup point enriched with the receptions that started in the
/// requested window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvzInfo {
    pub pvz: Pvz,
    pub receptions: Vec<ReceptionInfo>,
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Offset/limit window over pickup points ordered by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Converts a 1-based page number into an offset window.
    pub fn from_number(page: u64, limit: u64) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(limit),
            limit,
        }
    }
}
