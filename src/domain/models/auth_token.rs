use std::time::Duration;

use chrono::{DateTime, Utc};

/// A freshly minted bearer credential. Lives only long enough to be persisted
/// as a login, reset or registration token and handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub valid_duration: Duration,
}

impl AuthToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.valid_duration)
            .ok()
            .and_then(|validity| self.created_at.checked_add_signed(validity))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
