use async_trait::async_trait;

use crate::{
    application::error::ApplicationError,
    domain::models::{auth_token::AuthToken, one_time_token::OneTimeTokenKind, user::User},
};

/// Hands a freshly issued one-time token to whatever reaches the user
/// (mail, SMS). Called after the token row is committed.
#[async_trait]
pub trait TokenNotifier: Send + Sync {
    async fn deliver(
        &self,
        kind: OneTimeTokenKind,
        user: &User,
        token: &AuthToken,
    ) -> Result<(), ApplicationError>;
}
