//! Wire representations. Field names are camelCase on the wire.

use crate::domain::{
    Product, ProductId, Pvz, PvzId, PvzInfo, Reception, ReceptionId, ReceptionInfo,
    ReceptionStatus, Role, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DummyLoginRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreatePvzRequest {
    pub city: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceptionRequest {
    pub pvz_id: PvzId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    #[serde(rename = "type")]
    pub product_type: String,
    pub pvz_id: PvzId,
}

/// Query string of `GET /pvz`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvzInfoQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PvzDto {
    pub id: PvzId,
    pub registration_date: DateTime<Utc>,
    pub city: String,
}

impl From<Pvz> for PvzDto {
    fn from(pvz: Pvz) -> Self {
        Self {
            id: pvz.id,
            registration_date: pvz.registered_at,
            city: pvz.city,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionDto {
    pub id: ReceptionId,
    pub date_time: DateTime<Utc>,
    pub pvz_id: PvzId,
    pub status: ReceptionStatus,
}

impl From<Reception> for ReceptionDto {
    fn from(reception: Reception) -> Self {
        Self {
            id: reception.id,
            date_time: reception.started_at,
            pvz_id: reception.pvz_id,
            status: reception.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: ProductId,
    pub date_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub product_type: String,
    pub reception_id: ReceptionId,
}

impl From<Product> for ProductDto {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            date_time: product.created_at,
            product_type: product.product_type,
            reception_id: product.reception_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceptionInfoDto {
    pub reception: ReceptionDto,
    pub products: Vec<ProductDto>,
}

impl From<ReceptionInfo> for ReceptionInfoDto {
    fn from(info: ReceptionInfo) -> Self {
        Self {
            reception: info.reception.into(),
            products: info.products.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PvzInfoDto {
    pub pvz: PvzDto,
    pub receptions: Vec<ReceptionInfoDto>,
}

impl From<PvzInfo> for PvzInfoDto {
    fn from(info: PvzInfo) -> Self {
        Self {
            pvz: info.pvz.into(),
            receptions: info.receptions.into_iter().map(Into::into).collect(),
        }
    }
}
