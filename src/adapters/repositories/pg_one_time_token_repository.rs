use async_trait::async_trait;
use sqlx::query_as;

use crate::{
    adapters::repositories::pg_transaction::PgTransaction,
    application::{
        error::ApplicationError, repositories::one_time_token_repository::OneTimeTokenRepository,
        services::transaction::Transaction,
    },
    domain::models::one_time_token::{OneTimeToken, OneTimeTokenKind},
};

/// Backs either the password-reset or the registration table; both share the
/// same columns.
pub struct PgOneTimeTokenRepository {
    pool: sqlx::PgPool,
    kind: OneTimeTokenKind,
}

impl PgOneTimeTokenRepository {
    pub fn new(pool: sqlx::PgPool, kind: OneTimeTokenKind) -> Self {
        Self { pool, kind }
    }
}

#[async_trait]
impl OneTimeTokenRepository for PgOneTimeTokenRepository {
    fn kind(&self) -> OneTimeTokenKind {
        self.kind
    }

    async fn get_active(
        &self,
        token_value: &str,
    ) -> Result<Option<OneTimeToken>, ApplicationError> {
        let query = format!(
            "SELECT * FROM {} WHERE token_value = $1 AND is_used = FALSE AND expires_at > NOW() LIMIT 1",
            self.kind.table()
        );
        query_as::<_, OneTimeToken>(&query)
            .bind(token_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))
    }

    async fn create(
        &self,
        tx: &mut dyn Transaction,
        token: &OneTimeToken,
    ) -> Result<(), ApplicationError> {
        let query = format!(
            "INSERT INTO {} (id, user_id, token_value, is_used, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.kind.table()
        );
        sqlx::query(&query)
            .bind(token.id)
            .bind(token.user_id)
            .bind(&token.token_value)
            .bind(token.is_used)
            .bind(token.created_at)
            .bind(token.expires_at)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn mark_used(
        &self,
        tx: &mut dyn Transaction,
        token: &OneTimeToken,
    ) -> Result<bool, ApplicationError> {
        let query = format!(
            "UPDATE {} SET is_used = TRUE WHERE id = $1 AND is_used = FALSE",
            self.kind.table()
        );
        let result = sqlx::query(&query)
            .bind(token.id)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }
}
