use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{auth_token::AuthToken, token_state::TokenState};

#[derive(Debug, Clone, PartialEq)]
pub struct LoginToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LoginToken {
    pub fn issue(user_id: Uuid, token: &AuthToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_value: token.value.clone(),
            created_at: token.created_at,
            expires_at: token.expires_at(),
        }
    }

    /// Revocation pulls `expires_at` back to the revocation time, so a
    /// revoked row reads as expired from then on.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if now < self.expires_at {
            TokenState::Active
        } else {
            TokenState::Expired
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == TokenState::Active
    }
}
