use crate::domain::ports::TxManager;
use crate::error::{Error, Result, StoreError};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Request-scoped execution context.
///
/// Carries the caller's cancellation signal and, while a unit of work is
/// running, the transaction every gateway call of that unit must use.
pub struct TxContext<Tx> {
    tx: Option<Tx>,
    cancel: CancellationToken,
}

impl<Tx> TxContext<Tx> {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { tx: None, cancel }
    }

    /// The transaction bound by the enclosing unit of work.
    pub fn transaction(&mut self) -> Result<&mut Tx> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::storage("resolve transaction")(StoreError::NoTransaction))
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

impl<Tx> Default for TxContext<Tx> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs units of work atomically against a [`TxManager`].
pub struct TransactionCoordinator<M: TxManager> {
    manager: Arc<M>,
}

impl<M: TxManager> Clone for TransactionCoordinator<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<M: TxManager> TransactionCoordinator<M> {
    pub fn new(manager: Arc<M>) -> Self {
        Self { manager }
    }

    /// Runs `work` inside a transaction bound to `ctx`.
    ///
    /// When `ctx` already carries a transaction the work joins it and the
    /// outer unit decides whether to commit. Otherwise a transaction is
    /// begun, committed if `work` succeeds and rolled back if it fails or the
    /// context is cancelled. The error produced by `work` is returned
    /// unchanged; a failing rollback is logged but never replaces it.
    pub async fn run<T, F>(&self, ctx: &mut TxContext<M::Tx>, work: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut TxContext<M::Tx>) -> BoxFuture<'c, Result<T>> + Send,
    {
        if ctx.in_transaction() {
            debug!("joining ambient transaction");
            return work(ctx).await;
        }

        let cancel = ctx.cancel.clone();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let tx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            begun = self.manager.begin() => begun.map_err(Error::storage("begin transaction"))?,
        };
        ctx.tx = Some(tx);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = work(ctx) => result,
        };

        let tx = ctx
            .tx
            .take()
            .ok_or_else(|| Error::storage("finish transaction")(StoreError::NoTransaction))?;

        match outcome {
            Ok(value) => {
                self.manager
                    .commit(tx)
                    .await
                    .map_err(Error::storage("commit transaction"))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.manager.rollback(tx).await {
                    warn!(error = %rollback_err, original = %err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
