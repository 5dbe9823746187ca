use crate::domain::ports::{
    ProductRepository, PvzRepository, ReceptionRepository, TxManager, UserRepository,
};
use crate::domain::{
    Page, Product, ProductId, Pvz, PvzId, Reception, ReceptionId, ReceptionStatus, Role,
    TimeRange, User,
};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
struct Tables {
    pvzs: BTreeMap<PvzId, Pvz>,
    receptions: Vec<Reception>,
    /// Kept in insertion order, which is creation order.
    products: Vec<Product>,
    users: HashMap<String, User>,
}

impl Tables {
    fn open_reception(&self, pvz_id: PvzId) -> Option<&Reception> {
        self.receptions
            .iter()
            .find(|r| r.pvz_id == pvz_id && r.is_open())
    }
}

/// A transaction against [`InMemoryStore`].
///
/// Holds the store lock for its whole lifetime. Reads go to the committed
/// tables until the first write, which stages a copy; commit publishes the
/// copy. Dropping it without committing discards every change.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Option<Tables>,
}

impl InMemoryTx {
    fn read(&self) -> &Tables {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    fn write(&mut self) -> &mut Tables {
        let guard = &self.guard;
        self.staged.get_or_insert_with(|| Tables::clone(guard))
    }
}

/// A transactional in-process store.
///
/// Transactions are serialized by a single lock, so the read-then-write
/// checks of the services can never interleave. The store also enforces the
/// same constraints as the relational schema: unique user emails, at most one
/// open reception per pickup point, and references from receptions to pickup
/// points and from products to receptions.
///
/// `Clone` shares the underlying tables.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TxManager for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        Ok(InMemoryTx {
            guard,
            staged: None,
        })
    }

    async fn commit(&self, tx: InMemoryTx) -> StoreResult<()> {
        let InMemoryTx { mut guard, staged } = tx;
        if let Some(staged) = staged {
            *guard = staged;
        }
        Ok(())
    }

    async fn rollback(&self, tx: InMemoryTx) -> StoreResult<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl UserRepository<InMemoryTx> for InMemoryStore {
    async fn create_user(
        &self,
        tx: &mut InMemoryTx,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> StoreResult<User> {
        if tx.read().users.contains_key(email) {
            return Err(StoreError::AlreadyExists);
        }
        let user = User::new(email, password_hash, role);
        tx.write().users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, tx: &mut InMemoryTx, email: &str) -> StoreResult<Option<User>> {
        Ok(tx.read().users.get(email).cloned())
    }
}

#[async_trait]
impl PvzRepository<InMemoryTx> for InMemoryStore {
    async fn create_pvz(&self, tx: &mut InMemoryTx, city: &str) -> StoreResult<Pvz> {
        let pvz = Pvz::new(city);
        if tx.read().pvzs.contains_key(&pvz.id) {
            return Err(StoreError::AlreadyExists);
        }
        tx.write().pvzs.insert(pvz.id, pvz.clone());
        Ok(pvz)
    }

    async fn get_pvz(&self, tx: &mut InMemoryTx, id: PvzId) -> StoreResult<Pvz> {
        tx.read().pvzs.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_pvz(&self, tx: &mut InMemoryTx) -> StoreResult<Vec<Pvz>> {
        Ok(tx.read().pvzs.values().cloned().collect())
    }

    async fn get_pvz_page(&self, tx: &mut InMemoryTx, page: Page) -> StoreResult<Vec<Pvz>> {
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        Ok(tx
            .read()
            .pvzs
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReceptionRepository<InMemoryTx> for InMemoryStore {
    async fn find_open_reception(
        &self,
        tx: &mut InMemoryTx,
        pvz_id: PvzId,
    ) -> StoreResult<Option<Reception>> {
        Ok(tx.read().open_reception(pvz_id).cloned())
    }

    async fn create_reception(&self, tx: &mut InMemoryTx, pvz_id: PvzId) -> StoreResult<Reception> {
        let tables = tx.read();
        if !tables.pvzs.contains_key(&pvz_id) {
            return Err(StoreError::NotFound);
        }
        if tables.open_reception(pvz_id).is_some() {
            return Err(StoreError::AlreadyExists);
        }
        let reception = Reception::open(pvz_id);
        tx.write().receptions.push(reception.clone());
        Ok(reception)
    }

    async fn update_reception_status(
        &self,
        tx: &mut InMemoryTx,
        id: ReceptionId,
        status: ReceptionStatus,
    ) -> StoreResult<()> {
        let reception = tx
            .write()
            .receptions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        reception.status = status;
        Ok(())
    }

    async fn get_receptions_in_range(
        &self,
        tx: &mut InMemoryTx,
        pvz_id: PvzId,
        range: TimeRange,
    ) -> StoreResult<Vec<Reception>> {
        let mut receptions: Vec<Reception> = tx
            .read()
            .receptions
            .iter()
            .filter(|r| r.pvz_id == pvz_id && range.contains(r.started_at))
            .cloned()
            .collect();
        receptions.sort_by_key(|r| Reverse(r.started_at));
        Ok(receptions)
    }
}

#[async_trait]
impl ProductRepository<InMemoryTx> for InMemoryStore {
    async fn create_product(
        &self,
        tx: &mut InMemoryTx,
        product_type: &str,
        reception_id: ReceptionId,
    ) -> StoreResult<Product> {
        if !tx.read().receptions.iter().any(|r| r.id == reception_id) {
            return Err(StoreError::NotFound);
        }
        let product = Product::new(product_type, reception_id);
        tx.write().products.push(product.clone());
        Ok(product)
    }

    async fn delete_product(&self, tx: &mut InMemoryTx, id: ProductId) -> StoreResult<()> {
        let position = tx
            .read()
            .products
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        tx.write().products.remove(position);
        Ok(())
    }

    async fn find_last_product(
        &self,
        tx: &mut InMemoryTx,
        pvz_id: PvzId,
    ) -> StoreResult<Option<Product>> {
        let tables = tx.read();
        let Some(open) = tables.open_reception(pvz_id).map(|r| r.id) else {
            return Ok(None);
        };
        Ok(tables
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.reception_id == open)
            .max_by_key(|(position, p)| (p.created_at, *position))
            .map(|(_, p)| p.clone()))
    }

    async fn get_products_by_reception(
        &self,
        tx: &mut InMemoryTx,
        reception_id: ReceptionId,
    ) -> StoreResult<Vec<Product>> {
        Ok(tx
            .read()
            .products
            .iter()
            .filter(|p| p.reception_id == reception_id)
            .cloned()
            .collect())
    }
}
