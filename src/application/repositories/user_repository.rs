use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::{error::ApplicationError, services::transaction::Transaction},
    domain::models::user::User,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApplicationError>;
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApplicationError>;
    async fn create_user(
        &self,
        tx: &mut dyn Transaction,
        user: &User,
    ) -> Result<(), ApplicationError>;
    async fn update_password_hash(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApplicationError>;
    async fn mark_verified(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
    ) -> Result<(), ApplicationError>;
}
