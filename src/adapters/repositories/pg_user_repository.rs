use async_trait::async_trait;
use sqlx::query_as;
use uuid::Uuid;

use crate::{
    adapters::repositories::pg_transaction::PgTransaction,
    application::{
        error::ApplicationError, repositories::user_repository::UserRepository,
        services::transaction::Transaction,
    },
    domain::models::user::User,
};

/// A unique violation on `users.email` reads as "already registered".
fn create_user_error(error: sqlx::Error) -> ApplicationError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApplicationError::BadRequest("Email is already registered".to_string())
        }
        _ => ApplicationError::DatabaseError(error.to_string()),
    }
}

pub struct PgUserRepository {
    pool: sqlx::PgPool,
}

impl PgUserRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApplicationError> {
        let query = "SELECT * FROM auth.users WHERE email = $1";
        query_as::<_, User>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApplicationError> {
        let query = "SELECT * FROM auth.users WHERE id = $1";
        query_as::<_, User>(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))
    }

    async fn create_user(
        &self,
        tx: &mut dyn Transaction,
        user: &User,
    ) -> Result<(), ApplicationError> {
        let query = r#"
            INSERT INTO auth.users (id, email, password_hash, is_verified, created_at)
            VALUES ($1, $2, $3, $4, $5)
        "#;
        sqlx::query(query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_verified)
            .bind(user.created_at)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(create_user_error)?;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApplicationError> {
        let query = "UPDATE auth.users SET password_hash = $1 WHERE id = $2";
        let result = sqlx::query(query)
            .bind(password_hash)
            .bind(user_id)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(ApplicationError::NotFound);
        }
        Ok(())
    }

    async fn mark_verified(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
    ) -> Result<(), ApplicationError> {
        let query = "UPDATE auth.users SET is_verified = TRUE WHERE id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(PgTransaction::connection(tx)?)
            .await
            .map_err(|e| ApplicationError::DatabaseError(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(ApplicationError::NotFound);
        }
        Ok(())
    }
}
