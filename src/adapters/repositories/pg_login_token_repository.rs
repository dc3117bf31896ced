use async_trait::async_trait;
use sqlx::query_as;
use tracing::info;
use uuid::Uuid;

use crate::{
    adapters::repositories::pg_transaction::PgTransaction,
    application::{
        error::ApplicationError, repositories::login_token_repository::LoginTokenRepository,
        services::transaction::Transaction,
    },
    domain::models::login_token::LoginToken,
};

pub struct PgLoginTokenRepository {
    pool: sqlx::PgPool,
}

impl PgLoginTokenRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginTokenRepository for PgLoginTokenRepository {
    async fn get_active(&self, token_value: &str) -> Result<Option<LoginToken>, ApplicationError> {
        let query = r#"
            SELECT * FROM auth.login_tokens
            WHERE token_value = $1 AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
        "#;
        query_as::<_, LoginToken>(query)
            .bind(token_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))
    }

    async fn create(
        &self,
        tx: &mut dyn Transaction,
        token: &LoginToken,
    ) -> Result<(), ApplicationError> {
        let query = r#"
            INSERT INTO auth.login_tokens (id, user_id, token_value, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
        "#;
        sqlx::query(query)
            .bind(token.id)
            .bind(token.user_id)
            .bind(&token.token_value)
            .bind(token.created_at)
            .bind(token.expires_at)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn revoke(
        &self,
        tx: &mut dyn Transaction,
        token: &LoginToken,
    ) -> Result<(), ApplicationError> {
        let query = "UPDATE auth.login_tokens SET expires_at = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(token.id)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
    ) -> Result<u64, ApplicationError> {
        let query = r#"
            UPDATE auth.login_tokens SET expires_at = NOW()
            WHERE user_id = $1 AND expires_at > NOW()
        "#;
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        info!(
            "Expired {} login token rows for user {}",
            result.rows_affected(),
            user_id
        );
        Ok(result.rows_affected())
    }
}
