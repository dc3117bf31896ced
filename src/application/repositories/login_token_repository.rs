use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::{error::ApplicationError, services::transaction::Transaction},
    domain::models::login_token::LoginToken,
};

#[async_trait]
pub trait LoginTokenRepository: Send + Sync {
    /// Looks up a token by exact value among rows with `expires_at > now`.
    /// `Ok(None)` means no active token, which is not a fault.
    async fn get_active(&self, token_value: &str) -> Result<Option<LoginToken>, ApplicationError>;

    async fn create(
        &self,
        tx: &mut dyn Transaction,
        token: &LoginToken,
    ) -> Result<(), ApplicationError>;

    /// Sets `expires_at = now`. Rows are never deleted.
    async fn revoke(
        &self,
        tx: &mut dyn Transaction,
        token: &LoginToken,
    ) -> Result<(), ApplicationError>;

    /// Revokes every still-active login token of `user_id`, returning how many.
    async fn revoke_all_for_user(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
    ) -> Result<u64, ApplicationError>;
}
