use crate::application::transaction::{TransactionCoordinator, TxContext};
use crate::domain::ports::{
    ProductRepositoryRef, PvzRepositoryRef, ReceptionRepositoryRef, TxManager,
};
use crate::domain::{
    Page, Product, Pvz, PvzId, PvzInfo, Reception, ReceptionInfo, TimeRange,
};
use crate::error::{Error, Result, StoreError};
use crate::metrics::BusinessMetrics;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pickup-point, reception and product lifecycle.
///
/// Every operation is a single unit of work. The "one open reception per
/// pickup point" and "delete only the newest product" rules are checked with
/// a read followed by a write inside that unit, and are backed by uniqueness
/// constraints in the store.
pub struct PickupPointService<M: TxManager> {
    coordinator: TransactionCoordinator<M>,
    pvzs: PvzRepositoryRef<M::Tx>,
    receptions: ReceptionRepositoryRef<M::Tx>,
    products: ProductRepositoryRef<M::Tx>,
    cities: Arc<[String]>,
    metrics: BusinessMetrics,
}

impl<M: TxManager> PickupPointService<M> {
    /// Creates a new `PickupPointService`.
    ///
    /// # Arguments
    ///
    /// * `coordinator` - Runs each operation as one transaction.
    /// * `pvzs`, `receptions`, `products` - Persistence gateway.
    /// * `cities` - Cities in which a pickup point may be opened.
    pub fn new(
        coordinator: TransactionCoordinator<M>,
        pvzs: PvzRepositoryRef<M::Tx>,
        receptions: ReceptionRepositoryRef<M::Tx>,
        products: ProductRepositoryRef<M::Tx>,
        cities: Vec<String>,
    ) -> Self {
        Self {
            coordinator,
            pvzs,
            receptions,
            products,
            cities: cities.into(),
            metrics: BusinessMetrics::default(),
        }
    }

    /// Registers a pickup point in one of the allowed cities.
    ///
    /// The city is checked before storage is touched.
    pub async fn create_pvz(&self, ctx: &mut TxContext<M::Tx>, city: &str) -> Result<Pvz> {
        if !self.cities.iter().any(|allowed| allowed == city) {
            warn!(city, "rejected pickup point in unsupported city");
            return Err(Error::InvalidCity(city.to_owned()));
        }

        let pvzs = Arc::clone(&self.pvzs);
        let city = city.to_owned();
        let pvz = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    pvzs.create_pvz(tx, &city)
                        .await
                        .map_err(Error::storage("create pickup point"))
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(error = %err, "failed to create pickup point"))?;

        self.metrics.pvz_created();
        info!(pvz_id = %pvz.id, city = %pvz.city, "pickup point created");
        Ok(pvz)
    }

    /// Opens a reception unless the pickup point already has an open one.
    pub async fn start_reception(
        &self,
        ctx: &mut TxContext<M::Tx>,
        pvz_id: PvzId,
    ) -> Result<Reception> {
        let pvzs = Arc::clone(&self.pvzs);
        let receptions = Arc::clone(&self.receptions);
        let reception = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    pvzs.get_pvz(tx, pvz_id)
                        .await
                        .map_err(Error::storage("get pickup point"))?;

                    let open = receptions
                        .find_open_reception(tx, pvz_id)
                        .await
                        .map_err(Error::storage("find open reception"))?;
                    if open.is_some() {
                        return Err(Error::AlreadyOpen);
                    }

                    receptions
                        .create_reception(tx, pvz_id)
                        .await
                        .map_err(|err| match err {
                            // Lost a race against a concurrent start.
                            StoreError::AlreadyExists => Error::AlreadyOpen,
                            other => Error::storage("create reception")(other),
                        })
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(pvz_id = %pvz_id, error = %err, "failed to start reception"))?;

        self.metrics.reception_created();
        info!(pvz_id = %pvz_id, reception_id = %reception.id, "reception started");
        Ok(reception)
    }

    /// Closes the open reception of a pickup point.
    ///
    /// Returns the reception as it is after the transition, i.e. with status
    /// `closed`.
    pub async fn close_reception(
        &self,
        ctx: &mut TxContext<M::Tx>,
        pvz_id: PvzId,
    ) -> Result<Reception> {
        let receptions = Arc::clone(&self.receptions);
        let reception = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    let mut reception = receptions
                        .find_open_reception(tx, pvz_id)
                        .await
                        .map_err(Error::storage("find open reception"))?
                        .ok_or(Error::AllReceptionsClosed)?;

                    reception.close()?;
                    receptions
                        .update_reception_status(tx, reception.id, reception.status)
                        .await
                        .map_err(Error::storage("update reception status"))?;
                    Ok(reception)
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(pvz_id = %pvz_id, error = %err, "failed to close reception"))?;

        info!(pvz_id = %pvz_id, reception_id = %reception.id, "reception closed");
        Ok(reception)
    }

    /// Adds a product to the open reception of a pickup point.
    pub async fn add_product(
        &self,
        ctx: &mut TxContext<M::Tx>,
        pvz_id: PvzId,
        product_type: &str,
    ) -> Result<Product> {
        let receptions = Arc::clone(&self.receptions);
        let products = Arc::clone(&self.products);
        let product_type = product_type.to_owned();
        let product = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    let reception = receptions
                        .find_open_reception(tx, pvz_id)
                        .await
                        .map_err(Error::storage("find open reception"))?
                        .ok_or(Error::AllReceptionsClosed)?;

                    products
                        .create_product(tx, &product_type, reception.id)
                        .await
                        .map_err(Error::storage("create product"))
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(pvz_id = %pvz_id, error = %err, "failed to add product"))?;

        self.metrics.product_added();
        info!(
            pvz_id = %pvz_id,
            reception_id = %product.reception_id,
            product_id = %product.id,
            product_type = %product.product_type,
            "product added"
        );
        Ok(product)
    }

    /// Removes the most recently added product of the open reception.
    ///
    /// Returns the removed product.
    pub async fn delete_last_product(
        &self,
        ctx: &mut TxContext<M::Tx>,
        pvz_id: PvzId,
    ) -> Result<Product> {
        let receptions = Arc::clone(&self.receptions);
        let products = Arc::clone(&self.products);
        let product = self
            .coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    receptions
                        .find_open_reception(tx, pvz_id)
                        .await
                        .map_err(Error::storage("find open reception"))?
                        .ok_or(Error::AllReceptionsClosed)?;

                    let last = products
                        .find_last_product(tx, pvz_id)
                        .await
                        .map_err(Error::storage("find last product"))?
                        .ok_or(Error::ReceptionEmpty)?;

                    products
                        .delete_product(tx, last.id)
                        .await
                        .map_err(Error::storage("delete product"))?;
                    Ok(last)
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(pvz_id = %pvz_id, error = %err, "failed to delete last product"))?;

        info!(pvz_id = %pvz_id, product_id = %product.id, "last product deleted");
        Ok(product)
    }

    /// Every pickup point, unfiltered.
    pub async fn get_pvz_list(&self, ctx: &mut TxContext<M::Tx>) -> Result<Vec<Pvz>> {
        let pvzs = Arc::clone(&self.pvzs);
        self.coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    pvzs.list_pvz(tx)
                        .await
                        .map_err(Error::storage("list pickup points"))
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(error = %err, "failed to list pickup points"))
    }

    /// A page of pickup points with the receptions started in `range` and
    /// their products.
    ///
    /// Pagination applies to pickup points only. Receptions and products are
    /// fetched per pickup point and per reception; a join-based query is the
    /// way forward if page sizes grow.
    pub async fn get_pvz_info(
        &self,
        ctx: &mut TxContext<M::Tx>,
        range: TimeRange,
        page: Page,
    ) -> Result<Vec<PvzInfo>> {
        let pvzs = Arc::clone(&self.pvzs);
        let receptions = Arc::clone(&self.receptions);
        let products = Arc::clone(&self.products);
        self.coordinator
            .run(ctx, move |ctx| {
                async move {
                    let tx = ctx.transaction()?;
                    let page_of_pvzs = pvzs
                        .get_pvz_page(tx, page)
                        .await
                        .map_err(Error::storage("get pickup point page"))?;

                    let mut infos = Vec::with_capacity(page_of_pvzs.len());
                    for pvz in page_of_pvzs {
                        let in_range = receptions
                            .get_receptions_in_range(tx, pvz.id, range)
                            .await
                            .map_err(Error::storage("get receptions in range"))?;

                        let mut reception_infos = Vec::with_capacity(in_range.len());
                        for reception in in_range {
                            let attached = products
                                .get_products_by_reception(tx, reception.id)
                                .await
                                .map_err(Error::storage("get products by reception"))?;
                            reception_infos.push(ReceptionInfo {
                                reception,
                                products: attached,
                            });
                        }

                        infos.push(PvzInfo {
                            pvz,
                            receptions: reception_infos,
                        });
                    }
                    Ok(infos)
                }
                .boxed()
            })
            .await
            .inspect_err(|err| error!(error = %err, "failed to get pickup point info"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;
    use crate::error::ErrorKind;
    use uuid::Uuid;

    fn service() -> PickupPointService<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        PickupPointService::new(
            TransactionCoordinator::new(Arc::clone(&store)),
            store.clone(),
            store.clone(),
            store,
            vec!["Moscow".to_owned(), "Kazan".to_owned()],
        )
    }

    #[tokio::test]
    async fn test_create_pvz_rejects_unknown_city() {
        let service = service();
        let mut ctx = TxContext::new();

        let err = service.create_pvz(&mut ctx, "Atlantis").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCity);
        assert!(service.get_pvz_list(&mut ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_business_counters_track_successes_only() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let service = metrics::with_local_recorder(&recorder, service);
        let mut ctx = TxContext::new();

        let pvz = service.create_pvz(&mut ctx, "Kazan").await.unwrap();
        service.create_pvz(&mut ctx, "Atlantis").await.unwrap_err();
        service.start_reception(&mut ctx, pvz.id).await.unwrap();
        service.start_reception(&mut ctx, pvz.id).await.unwrap_err();
        service.add_product(&mut ctx, pvz.id, "shoes").await.unwrap();

        let rendered = handle.render();
        assert!(rendered.contains("business_pvz_created_total 1"));
        assert!(rendered.contains("business_order_receptions_created_total 1"));
        assert!(rendered.contains("business_products_added_total 1"));
    }

    #[tokio::test]
    async fn test_city_check_is_exact() {
        let service = service();
        let mut ctx = TxContext::new();

        let err = service.create_pvz(&mut ctx, "moscow").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCity);
    }

    #[tokio::test]
    async fn test_start_reception_for_unknown_pvz() {
        let service = service();
        let mut ctx = TxContext::new();

        let err = service
            .start_reception(&mut ctx, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_second_start_fails_with_already_open() {
        let service = service();
        let mut ctx = TxContext::new();
        let pvz = service.create_pvz(&mut ctx, "Moscow").await.unwrap();

        service.start_reception(&mut ctx, pvz.id).await.unwrap();
        let err = service.start_reception(&mut ctx, pvz.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyOpen);
    }

    #[tokio::test]
    async fn test_close_returns_closed_reception() {
        let service = service();
        let mut ctx = TxContext::new();
        let pvz = service.create_pvz(&mut ctx, "Kazan").await.unwrap();
        let started = service.start_reception(&mut ctx, pvz.id).await.unwrap();

        let closed = service.close_reception(&mut ctx, pvz.id).await.unwrap();
        assert_eq!(closed.id, started.id);
        assert!(!closed.is_open());

        let err = service.close_reception(&mut ctx, pvz.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllReceptionsClosed);
    }

    #[tokio::test]
    async fn test_delete_from_empty_reception() {
        let service = service();
        let mut ctx = TxContext::new();
        let pvz = service.create_pvz(&mut ctx, "Kazan").await.unwrap();

        let err = service.delete_last_product(&mut ctx, pvz.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllReceptionsClosed);

        service.start_reception(&mut ctx, pvz.id).await.unwrap();
        let err = service.delete_last_product(&mut ctx, pvz.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReceptionEmpty);
    }

    #[tokio::test]
    async fn test_delete_never_reaches_into_closed_reception() {
        let service = service();
        let mut ctx = TxContext::new();
        let pvz = service.create_pvz(&mut ctx, "Kazan").await.unwrap();

        service.start_reception(&mut ctx, pvz.id).await.unwrap();
        service.add_product(&mut ctx, pvz.id, "shoes").await.unwrap();
        service.close_reception(&mut ctx, pvz.id).await.unwrap();
        service.start_reception(&mut ctx, pvz.id).await.unwrap();

        let err = service.delete_last_product(&mut ctx, pvz.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReceptionEmpty);
    }
}
