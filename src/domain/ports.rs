//! Seams between the services and their collaborators.
//!
//! Repository calls receive the transaction handle explicitly. Services take it
//! from the request context with [`TxContext::transaction`], so a gateway call
//! can never run outside the unit of work that issued it.
//!
//! [`TxContext::transaction`]: crate::application::transaction::TxContext::transaction

use super::product::{Product, ProductId};
use super::pvz::{Page, Pvz, PvzId, TimeRange};
use super::reception::{Reception, ReceptionId, ReceptionStatus};
use super::user::{Principal, Role, User, UserId};
use crate::error::{Result, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Opens, commits and rolls back storage transactions.
#[async_trait]
pub trait TxManager: Send + Sync {
    type Tx: Send + 'static;

    async fn begin(&self) -> StoreResult<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;
    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()>;
}

#[async_trait]
pub trait UserRepository<Tx: Send>: Send + Sync {
    /// Fails with `AlreadyExists` when the email is taken.
    async fn create_user(
        &self,
        tx: &mut Tx,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> StoreResult<User>;
    async fn get_user(&self, tx: &mut Tx, email: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait PvzRepository<Tx: Send>: Send + Sync {
    async fn create_pvz(&self, tx: &mut Tx, city: &str) -> StoreResult<Pvz>;
    /// Fails with `NotFound` for an unknown identifier.
    async fn get_pvz(&self, tx: &mut Tx, id: PvzId) -> StoreResult<Pvz>;
    async fn list_pvz(&self, tx: &mut Tx) -> StoreResult<Vec<Pvz>>;
    /// Pickup points ordered by identifier.
    async fn get_pvz_page(&self, tx: &mut Tx, page: Page) -> StoreResult<Vec<Pvz>>;
}

#[async_trait]
pub trait ReceptionRepository<Tx: Send>: Send + Sync {
    async fn find_open_reception(&self, tx: &mut Tx, pvz_id: PvzId)
    -> StoreResult<Option<Reception>>;
    /// Inserts an open reception. Fails with `AlreadyExists` if the pickup
    /// point already has one and with `NotFound` if the pickup point is unknown.
    async fn create_reception(&self, tx: &mut Tx, pvz_id: PvzId) -> StoreResult<Reception>;
    async fn update_reception_status(
        &self,
        tx: &mut Tx,
        id: ReceptionId,
        status: ReceptionStatus,
    ) -> StoreResult<()>;
    /// Receptions of `pvz_id` started within `range`, newest first.
    async fn get_receptions_in_range(
        &self,
        tx: &mut Tx,
        pvz_id: PvzId,
        range: TimeRange,
    ) -> StoreResult<Vec<Reception>>;
}

#[async_trait]
pub trait ProductRepository<Tx: Send>: Send + Sync {
    /// Fails with `NotFound` if the reception is unknown.
    async fn create_product(
        &self,
        tx: &mut Tx,
        product_type: &str,
        reception_id: ReceptionId,
    ) -> StoreResult<Product>;
    async fn delete_product(&self, tx: &mut Tx, id: ProductId) -> StoreResult<()>;
    /// Most recently created product of the pickup point's open reception.
    async fn find_last_product(&self, tx: &mut Tx, pvz_id: PvzId) -> StoreResult<Option<Product>>;
    /// Products of a reception in creation order.
    async fn get_products_by_reception(
        &self,
        tx: &mut Tx,
        reception_id: ReceptionId,
    ) -> StoreResult<Vec<Product>>;
}

/// One-way password digests.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String>;
    fn verify(&self, digest: &str, plaintext: &str) -> bool;
}

/// Signs and verifies access tokens.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: UserId, role: Role) -> Result<String>;
    fn verify(&self, token: &str) -> Result<Principal>;
}

pub type UserRepositoryRef<Tx> = Arc<dyn UserRepository<Tx>>;
pub type PvzRepositoryRef<Tx> = Arc<dyn PvzRepository<Tx>>;
pub type ReceptionRepositoryRef<Tx> = Arc<dyn ReceptionRepository<Tx>>;
pub type ProductRepositoryRef<Tx> = Arc<dyn ProductRepository<Tx>>;
pub type PasswordHasherRef = Arc<dyn PasswordHasher>;
pub type TokenIssuerRef = Arc<dyn TokenIssuer>;
