use std::any::Any;

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres};
use tracing::debug;

use crate::application::{
    error::ApplicationError,
    services::transaction::{Transaction, TransactionManager},
};

pub struct PgTransactionManager {
    pool: sqlx::PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

/// Dropping an unresolved transaction rolls it back, which is what happens when
/// a request is cancelled mid-transaction.
pub struct PgTransaction {
    inner: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgTransaction {
    /// The connection behind a transaction handed out by [`PgTransactionManager`].
    pub fn connection(tx: &mut dyn Transaction) -> Result<&mut PgConnection, ApplicationError> {
        tx.as_any_mut()
            .downcast_mut::<PgTransaction>()
            .and_then(|tx| tx.inner.as_deref_mut())
            .ok_or_else(|| {
                ApplicationError::InternalError(
                    "Transaction is not an open PostgreSQL transaction".to_string(),
                )
            })
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(&mut self) -> Result<(), ApplicationError> {
        match self.inner.take() {
            Some(tx) => tx
                .commit()
                .await
                .map_err(|e| ApplicationError::DatabaseError(e.to_string())),
            None => Ok(()),
        }
    }

    // A failed commit has already consumed the handle; there is nothing left
    // to roll back and the server discarded the transaction.
    async fn rollback(&mut self) -> Result<(), ApplicationError> {
        match self.inner.take() {
            Some(tx) => {
                debug!("Rolling back PostgreSQL transaction");
                tx.rollback()
                    .await
                    .map_err(|e| ApplicationError::DatabaseError(e.to_string()))
            }
            None => Ok(()),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    async fn begin(&self) -> Result<Box<dyn Transaction>, ApplicationError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        Ok(Box::new(PgTransaction { inner: Some(tx) }))
    }

    async fn ping(&self) -> Result<(), ApplicationError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
