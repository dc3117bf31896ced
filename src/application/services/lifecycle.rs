use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        error::ApplicationError,
        repositories::{
            login_token_repository::LoginTokenRepository,
            one_time_token_repository::OneTimeTokenRepository, user_repository::UserRepository,
        },
        services::{
            credentials::{compare_password_blocking, generate_token, hash_password_blocking},
            notifier::TokenNotifier,
            session_store::{session_key_for, SessionStore},
            transaction::TransactionCoordinator,
        },
    },
    domain::{
        config::auth::AuthConfig,
        models::{
            auth_token::AuthToken,
            login_token::LoginToken,
            one_time_token::{
                OneTimeToken, OneTimeTokenKind, PasswordResetToken, UserRegistrationToken,
            },
            session::UserSession,
            user::User,
        },
    },
};

const MIN_PASSWORD_LENGTH: usize = 8;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), ApplicationError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApplicationError::Validation(
            "Email address is malformed".to_string(),
        )),
    }
}

fn validate_password(password: &str) -> Result<(), ApplicationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApplicationError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct TokenValidity {
    login: Duration,
    password_reset: Duration,
    registration: Duration,
}

pub struct TokenRepositories {
    pub login: Arc<dyn LoginTokenRepository>,
    pub password_reset: Arc<dyn OneTimeTokenRepository>,
    pub registration: Arc<dyn OneTimeTokenRepository>,
}

/// Login, logout, revocation, password reset and registration flows.
///
/// Durable token rows and cached sessions are written by separate steps, never
/// atomically. A login whose cache write fails leaves a committed row with no
/// session; that row cannot authenticate anything because only the session
/// entry is checked. Logout revokes the row before dropping the session so a
/// crash in between errs on the side of the row being revoked.
pub struct LifecycleManager {
    users: Arc<dyn UserRepository>,
    tokens: TokenRepositories,
    sessions: Arc<SessionStore>,
    coordinator: Arc<TransactionCoordinator>,
    notifier: Arc<dyn TokenNotifier>,
    validity: TokenValidity,
}

impl LifecycleManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: TokenRepositories,
        sessions: Arc<SessionStore>,
        coordinator: Arc<TransactionCoordinator>,
        notifier: Arc<dyn TokenNotifier>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            sessions,
            coordinator,
            notifier,
            validity: TokenValidity {
                login: config.login_token_validity,
                password_reset: config.reset_token_validity,
                registration: config.registration_token_validity,
            },
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ApplicationError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!("Login rejected: no account for the given email");
            return Err(ApplicationError::Unauthorized);
        };

        if !compare_password_blocking(user.password_hash.clone(), password.to_string()).await? {
            warn!("Login rejected for user {}: wrong password", user.id);
            return Err(ApplicationError::Unauthorized);
        }

        let token = generate_token(self.validity.login);
        if self.tokens.login.get_active(&token.value).await?.is_some() {
            error!("Generated login token collides with an active one");
            return Err(ApplicationError::InternalError(
                "Login token collision".to_string(),
            ));
        }

        let row = LoginToken::issue(user.id, &token);
        let repo = self.tokens.login.clone();
        self.coordinator
            .execute_in_transaction(move |tx| Box::pin(async move { repo.create(tx, &row).await }))
            .await?;

        let session = UserSession {
            user_id: user.id,
            email: user.email,
        };
        self.sessions
            .create_session(&session_key_for(&token.value), token.valid_duration, &session)
            .await?;

        info!("User {} logged in", session.user_id);
        Ok(token)
    }

    /// Unknown or already expired tokens still get their session key cleared.
    pub async fn logout(&self, token_value: &str) -> Result<(), ApplicationError> {
        if let Some(row) = self.tokens.login.get_active(token_value).await? {
            let user_id = row.user_id;
            let repo = self.tokens.login.clone();
            self.coordinator
                .execute_in_transaction(move |tx| {
                    Box::pin(async move { repo.revoke(tx, &row).await })
                })
                .await?;
            info!("User {} logged out", user_id);
        }

        self.sessions
            .delete_session(&session_key_for(token_value))
            .await
    }

    pub async fn require_session(&self, token_value: &str) -> Result<UserSession, ApplicationError> {
        self.sessions
            .get_session(&session_key_for(token_value))
            .await?
            .ok_or(ApplicationError::InvalidToken)
    }

    /// Revokes every login of `user_id`: durable rows first, then the cached
    /// sessions found by a full scan. Returns the number of sessions removed.
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> Result<usize, ApplicationError> {
        let repo = self.tokens.login.clone();
        let revoked = self
            .coordinator
            .execute_in_transaction(move |tx| {
                Box::pin(async move { repo.revoke_all_for_user(tx, user_id).await })
            })
            .await?;
        info!("Revoked {} login tokens for user {}", revoked, user_id);

        self.sessions.delete_sessions_for_user(user_id).await
    }

    /// `Ok(None)` when no account has this email. The caller answers the same
    /// way in both cases and delivers the token out of band.
    pub async fn create_password_reset_token(
        &self,
        email: &str,
    ) -> Result<Option<AuthToken>, ApplicationError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            info!("Password reset requested for an unknown email");
            return Ok(None);
        };

        let token = generate_token(self.validity.password_reset);
        let row: PasswordResetToken = OneTimeToken::issue(user.id, &token);
        self.insert_one_time_token(self.tokens.password_reset.clone(), row)
            .await?;

        info!("Password reset token issued for user {}", user.id);
        self.notify(OneTimeTokenKind::PasswordReset, &user, &token).await;
        Ok(Some(token))
    }

    /// Consumes the reset token, stores the new hash in the same transaction,
    /// then signs the user out everywhere.
    pub async fn reset_password(
        &self,
        token_value: &str,
        new_password: &str,
    ) -> Result<(), ApplicationError> {
        validate_password(new_password)?;

        let Some(reset) = self.tokens.password_reset.get_active(token_value).await? else {
            warn!("Password reset attempted with an unusable token");
            return Err(ApplicationError::BadRequest(
                "Reset token is invalid, expired or already used".to_string(),
            ));
        };
        let user_id = reset.user_id;

        let hash = hash_password_blocking(new_password.to_string()).await?;
        let tokens = self.tokens.password_reset.clone();
        let users = self.users.clone();
        let consumed = self
            .coordinator
            .execute_in_transaction(move |tx| {
                Box::pin(async move {
                    if !tokens.mark_used(tx, &reset).await? {
                        return Ok(false);
                    }
                    users.update_password_hash(tx, reset.user_id, &hash).await?;
                    Ok(true)
                })
            })
            .await?;

        if !consumed {
            warn!("Reset token for user {} was consumed concurrently", user_id);
            return Err(ApplicationError::BadRequest(
                "Reset token is invalid, expired or already used".to_string(),
            ));
        }

        info!("Password reset completed for user {}", user_id);
        self.revoke_all_sessions(user_id).await?;
        Ok(())
    }

    pub async fn create_registration_token(
        &self,
        user_id: Uuid,
    ) -> Result<AuthToken, ApplicationError> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(ApplicationError::NotFound);
        };

        let token = generate_token(self.validity.registration);
        let row: UserRegistrationToken = OneTimeToken::issue(user_id, &token);
        self.insert_one_time_token(self.tokens.registration.clone(), row)
            .await?;
        self.notifier
            .deliver(OneTimeTokenKind::Registration, &user, &token)
            .await?;
        Ok(token)
    }

    /// Creates the account and its email-verification token in one transaction.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthToken), ApplicationError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ApplicationError::BadRequest(
                "Email is already registered".to_string(),
            ));
        }

        let hash = hash_password_blocking(password.to_string()).await?;
        let user = User::new(email, hash);
        let token = generate_token(self.validity.registration);
        let row = OneTimeToken::issue(user.id, &token);

        let users = self.users.clone();
        let tokens = self.tokens.registration.clone();
        let new_user = user.clone();
        self.coordinator
            .execute_in_transaction(move |tx| {
                Box::pin(async move {
                    users.create_user(tx, &new_user).await?;
                    tokens.create(tx, &row).await
                })
            })
            .await?;

        info!("Registered user {}", user.id);
        self.notify(OneTimeTokenKind::Registration, &user, &token).await;
        Ok((user, token))
    }

    pub async fn confirm_registration(&self, token_value: &str) -> Result<Uuid, ApplicationError> {
        let Some(registration) = self.tokens.registration.get_active(token_value).await? else {
            return Err(ApplicationError::BadRequest(
                "Registration token is invalid, expired or already used".to_string(),
            ));
        };
        let user_id = registration.user_id;

        let tokens = self.tokens.registration.clone();
        let users = self.users.clone();
        let consumed = self
            .coordinator
            .execute_in_transaction(move |tx| {
                Box::pin(async move {
                    if !tokens.mark_used(tx, &registration).await? {
                        return Ok(false);
                    }
                    users.mark_verified(tx, registration.user_id).await?;
                    Ok(true)
                })
            })
            .await?;

        if !consumed {
            return Err(ApplicationError::BadRequest(
                "Registration token is invalid, expired or already used".to_string(),
            ));
        }
        info!("User {} verified their email", user_id);
        Ok(user_id)
    }

    /// Rewrites the email cached in an active session, keeping its expiry.
    pub async fn change_session_email(
        &self,
        token_value: &str,
        email: &str,
    ) -> Result<UserSession, ApplicationError> {
        let email = normalize_email(email);
        validate_email(&email)?;

        self.sessions
            .update_session(&session_key_for(token_value), |session| {
                session.email = email.clone();
            })
            .await?
            .ok_or(ApplicationError::InvalidToken)
    }

    /// The token row is already committed, so a failed delivery is logged and
    /// the flow goes on; the user can ask for another token.
    async fn notify(&self, kind: OneTimeTokenKind, user: &User, token: &AuthToken) {
        if let Err(e) = self.notifier.deliver(kind, user, token).await {
            error!("Delivering {:?} token to user {} failed: {:?}", kind, user.id, e);
        }
    }

    async fn insert_one_time_token(
        &self,
        repo: Arc<dyn OneTimeTokenRepository>,
        row: OneTimeToken,
    ) -> Result<(), ApplicationError> {
        let kind = repo.kind();
        if repo.get_active(&row.token_value).await?.is_some() {
            error!("Generated {:?} token collides with an active one", kind);
            return Err(ApplicationError::InternalError(
                "One-time token collision".to_string(),
            ));
        }
        self.coordinator
            .execute_in_transaction(move |tx| Box::pin(async move { repo.create(tx, &row).await }))
            .await
    }
}
