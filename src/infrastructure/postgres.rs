use crate::domain::ports::{
    ProductRepository, PvzRepository, ReceptionRepository, TxManager, UserRepository,
};
use crate::domain::{
    Page, Product, ProductId, Pvz, PvzId, Reception, ReceptionId, ReceptionStatus, Role,
    TimeRange, User,
};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

pub type PgTx = Transaction<'static, Postgres>;

/// PostgreSQL-backed store.
///
/// The schema lives in `migrations/` and is applied by [`PostgresStore::connect`].
/// The partial unique index on open receptions is the storage-level backstop
/// for concurrent `start_reception` calls.
///
/// `Clone` shares the underlying pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;

        info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        _ => StoreError::Backend(err.to_string()),
    }
}

fn pvz_from_row(row: &PgRow) -> Result<Pvz, sqlx::Error> {
    Ok(Pvz {
        id: row.try_get("id")?,
        city: row.try_get("city")?,
        registered_at: row.try_get("registration_date")?,
    })
}

fn reception_from_row(row: &PgRow) -> Result<Reception, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Reception {
        id: row.try_get("id")?,
        pvz_id: row.try_get("pvz_id")?,
        status: status
            .parse::<ReceptionStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        started_at: row.try_get("date_time")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: row.try_get("id")?,
        reception_id: row.try_get("reception_id")?,
        product_type: row.try_get("type")?,
        created_at: row.try_get("date_time")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("hashed_password")?,
        role: role
            .parse::<Role>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: row.try_get("created_at")?,
    })
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl TxManager for PostgresStore {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        self.pool.begin().await.map_err(map_sqlx)
    }

    async fn commit(&self, tx: PgTx) -> StoreResult<()> {
        tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(&self, tx: PgTx) -> StoreResult<()> {
        tx.rollback().await.map_err(map_sqlx)
    }
}

#[async_trait]
impl UserRepository<PgTx> for PostgresStore {
    async fn create_user(
        &self,
        tx: &mut PgTx,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> StoreResult<User> {
        let user = User::new(email, password_hash, role);
        sqlx::query(
            "INSERT INTO users (id, email, hashed_password, role, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn get_user(&self, tx: &mut PgTx, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, hashed_password, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl PvzRepository<PgTx> for PostgresStore {
    async fn create_pvz(&self, tx: &mut PgTx, city: &str) -> StoreResult<Pvz> {
        let pvz = Pvz::new(city);
        sqlx::query("INSERT INTO pvz (id, city, registration_date) VALUES ($1, $2, $3)")
            .bind(pvz.id)
            .bind(&pvz.city)
            .bind(pvz.registered_at)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(pvz)
    }

    async fn get_pvz(&self, tx: &mut PgTx, id: PvzId) -> StoreResult<Pvz> {
        let row = sqlx::query("SELECT id, city, registration_date FROM pvz WHERE id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        pvz_from_row(&row).map_err(map_sqlx)
    }

    async fn list_pvz(&self, tx: &mut PgTx) -> StoreResult<Vec<Pvz>> {
        let rows = sqlx::query("SELECT id, city, registration_date FROM pvz ORDER BY id")
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        rows.iter()
            .map(pvz_from_row)
            .collect::<Result<_, _>>()
            .map_err(map_sqlx)
    }

    async fn get_pvz_page(&self, tx: &mut PgTx, page: Page) -> StoreResult<Vec<Pvz>> {
        let rows = sqlx::query(
            "SELECT id, city, registration_date FROM pvz ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(clamp(page.limit))
        .bind(clamp(page.offset))
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        rows.iter()
            .map(pvz_from_row)
            .collect::<Result<_, _>>()
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl ReceptionRepository<PgTx> for PostgresStore {
    // Row-locks the open reception until the transaction ends, so closing it
    // and adding or deleting its products queue behind each other.
    async fn find_open_reception(
        &self,
        tx: &mut PgTx,
        pvz_id: PvzId,
    ) -> StoreResult<Option<Reception>> {
        let row = sqlx::query(
            "SELECT id, pvz_id, status, date_time FROM reception \
             WHERE pvz_id = $1 AND status = 'open' \
             ORDER BY date_time DESC LIMIT 1 FOR UPDATE",
        )
        .bind(pvz_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        row.as_ref()
            .map(reception_from_row)
            .transpose()
            .map_err(map_sqlx)
    }

    async fn create_reception(&self, tx: &mut PgTx, pvz_id: PvzId) -> StoreResult<Reception> {
        let reception = Reception::open(pvz_id);
        sqlx::query("INSERT INTO reception (id, pvz_id, status, date_time) VALUES ($1, $2, $3, $4)")
            .bind(reception.id)
            .bind(reception.pvz_id)
            .bind(reception.status.as_str())
            .bind(reception.started_at)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(reception)
    }

    async fn update_reception_status(
        &self,
        tx: &mut PgTx,
        id: ReceptionId,
        status: ReceptionStatus,
    ) -> StoreResult<()> {
        let result = sqlx::query("UPDATE reception SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_receptions_in_range(
        &self,
        tx: &mut PgTx,
        pvz_id: PvzId,
        range: TimeRange,
    ) -> StoreResult<Vec<Reception>> {
        let rows = sqlx::query(
            "SELECT id, pvz_id, status, date_time FROM reception \
             WHERE pvz_id = $1 AND date_time >= $2 AND date_time <= $3 \
             ORDER BY date_time DESC",
        )
        .bind(pvz_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        rows.iter()
            .map(reception_from_row)
            .collect::<Result<_, _>>()
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl ProductRepository<PgTx> for PostgresStore {
    async fn create_product(
        &self,
        tx: &mut PgTx,
        product_type: &str,
        reception_id: ReceptionId,
    ) -> StoreResult<Product> {
        let product = Product::new(product_type, reception_id);
        sqlx::query("INSERT INTO product (id, reception_id, type, date_time) VALUES ($1, $2, $3, $4)")
            .bind(product.id)
            .bind(product.reception_id)
            .bind(&product.product_type)
            .bind(product.created_at)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        Ok(product)
    }

    async fn delete_product(&self, tx: &mut PgTx, id: ProductId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_last_product(&self, tx: &mut PgTx, pvz_id: PvzId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            "SELECT p.id, p.reception_id, p.type, p.date_time FROM product p \
             JOIN reception r ON p.reception_id = r.id \
             WHERE r.pvz_id = $1 AND r.status = 'open' \
             ORDER BY p.date_time DESC, p.seq DESC LIMIT 1",
        )
        .bind(pvz_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        row.as_ref()
            .map(product_from_row)
            .transpose()
            .map_err(map_sqlx)
    }

    async fn get_products_by_reception(
        &self,
        tx: &mut PgTx,
        reception_id: ReceptionId,
    ) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, reception_id, type, date_time FROM product \
             WHERE reception_id = $1 ORDER BY date_time, seq",
        )
        .bind(reception_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx)?;
        rows.iter()
            .map(product_from_row)
            .collect::<Result<_, _>>()
            .map_err(map_sqlx)
    }
}
