use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{auth_token::AuthToken, token_state::TokenState};

/// Purpose a single-use token was minted for. Each kind lives in its own table
/// and a token of one kind is never accepted as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OneTimeTokenKind {
    PasswordReset,
    Registration,
}

impl OneTimeTokenKind {
    pub fn table(&self) -> &'static str {
        match self {
            OneTimeTokenKind::PasswordReset => "auth.password_reset_tokens",
            OneTimeTokenKind::Registration => "auth.registration_tokens",
        }
    }
}

/// Password-reset and registration tokens share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OneTimeToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_value: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub type PasswordResetToken = OneTimeToken;
pub type UserRegistrationToken = OneTimeToken;

impl OneTimeToken {
    pub fn issue(user_id: Uuid, token: &AuthToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_value: token.value.clone(),
            is_used: false,
            created_at: token.created_at,
            expires_at: token.expires_at(),
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.is_used {
            TokenState::Used
        } else if now < self.expires_at {
            TokenState::Active
        } else {
            TokenState::Expired
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == TokenState::Active
    }
}
