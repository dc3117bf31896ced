use async_trait::async_trait;

use crate::{
    application::{error::ApplicationError, services::transaction::Transaction},
    domain::models::one_time_token::{OneTimeToken, OneTimeTokenKind},
};

/// Storage for single-use tokens of one [`OneTimeTokenKind`].
#[async_trait]
pub trait OneTimeTokenRepository: Send + Sync {
    fn kind(&self) -> OneTimeTokenKind;

    /// Matches only unused rows with `expires_at > now`.
    async fn get_active(&self, token_value: &str)
        -> Result<Option<OneTimeToken>, ApplicationError>;

    async fn create(
        &self,
        tx: &mut dyn Transaction,
        token: &OneTimeToken,
    ) -> Result<(), ApplicationError>;

    /// Flips `is_used` if it is still false. `Ok(false)` means someone else
    /// consumed the token first.
    async fn mark_used(
        &self,
        tx: &mut dyn Transaction,
        token: &OneTimeToken,
    ) -> Result<bool, ApplicationError>;
}
