use async_trait::async_trait;
use tracing::info;

use crate::{
    application::{error::ApplicationError, services::notifier::TokenNotifier},
    domain::models::{auth_token::AuthToken, one_time_token::OneTimeTokenKind, user::User},
};

/// Stand-in until a mail transport is wired: records that a token is ready,
/// never the token itself.
pub struct LogTokenNotifier;

#[async_trait]
impl TokenNotifier for LogTokenNotifier {
    async fn deliver(
        &self,
        kind: OneTimeTokenKind,
        user: &User,
        token: &AuthToken,
    ) -> Result<(), ApplicationError> {
        info!(
            "{:?} token for user {} ready for delivery, valid until {}",
            kind,
            user.id,
            token.expires_at()
        );
        Ok(())
    }
}
