use super::reception::ReceptionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProductId = Uuid;

/// A product accepted within a reception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub reception_id: ReceptionId,
    /// Free-form classification, e.g. "electronics".
    pub product_type: String,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(product_type: impl Into<String>, reception_id: ReceptionId) -> Self {
        Self {
            id: Uuid::new_v4(),
            reception_id,
            product_type: product_type.into(),
            created_at: Utc::now(),
        }
    }
}
