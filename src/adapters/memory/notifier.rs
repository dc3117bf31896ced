use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    application::{error::ApplicationError, services::notifier::TokenNotifier},
    domain::models::{auth_token::AuthToken, one_time_token::OneTimeTokenKind, user::User},
};

#[derive(Debug, Clone)]
struct Delivery {
    kind: OneTimeTokenKind,
    email: String,
    token: String,
}

/// Keeps every delivered token so tests can play the user's inbox.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn last_token(&self, kind: OneTimeTokenKind, email: &str) -> Option<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|d| d.kind == kind && d.email == email)
            .map(|d| d.token.clone())
    }
}

#[async_trait]
impl TokenNotifier for RecordingNotifier {
    async fn deliver(
        &self,
        kind: OneTimeTokenKind,
        user: &User,
        token: &AuthToken,
    ) -> Result<(), ApplicationError> {
        if *self.failing.lock().unwrap() {
            return Err(ApplicationError::InternalError(
                "injected delivery failure".to_string(),
            ));
        }
        self.deliveries.lock().unwrap().push(Delivery {
            kind,
            email: user.email.clone(),
            token: token.value.clone(),
        });
        Ok(())
    }
}
