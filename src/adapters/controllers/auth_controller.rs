use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};

use crate::{
    adapters::{
        dto::auth_dto::{
            CredentialsRequest, ForgotPasswordRequest, LoginResponse, RegisterResponse,
            ResetPasswordRequest, RevokeResponse, TokenRequest, UpdateSessionRequest,
        },
        middleware::SessionToken,
    },
    application::{error::ApplicationError, services::lifecycle::LifecycleManager},
    domain::models::session::UserSession,
};

pub struct AuthController;

impl AuthController {
    /// POST /api/v1/auth/register
    pub async fn register(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Json(body): Json<CredentialsRequest>,
    ) -> Result<(StatusCode, Json<RegisterResponse>), ApplicationError> {
        let (user, _) = lifecycle.register(&body.email, &body.password).await?;
        Ok((
            StatusCode::CREATED,
            Json(RegisterResponse { user_id: user.id }),
        ))
    }

    /// POST /api/v1/auth/register/confirm
    pub async fn confirm_registration(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Json(body): Json<TokenRequest>,
    ) -> Result<StatusCode, ApplicationError> {
        lifecycle.confirm_registration(&body.token).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// POST /api/v1/auth/login
    pub async fn login(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Json(body): Json<CredentialsRequest>,
    ) -> Result<Json<LoginResponse>, ApplicationError> {
        let token = lifecycle.login(&body.email, &body.password).await?;
        Ok(Json(LoginResponse {
            expires_in: token.valid_duration.as_secs(),
            token: token.value,
        }))
    }

    /// POST /api/v1/auth/logout
    pub async fn logout(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Extension(SessionToken(token)): Extension<SessionToken>,
    ) -> Result<StatusCode, ApplicationError> {
        lifecycle.logout(&token).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// GET /api/v1/auth/session
    pub async fn get_session(Extension(session): Extension<UserSession>) -> Json<UserSession> {
        Json(session)
    }

    /// PATCH /api/v1/auth/session
    pub async fn update_session(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Extension(SessionToken(token)): Extension<SessionToken>,
        Json(body): Json<UpdateSessionRequest>,
    ) -> Result<Json<UserSession>, ApplicationError> {
        let session = lifecycle.change_session_email(&token, &body.email).await?;
        Ok(Json(session))
    }

    /// POST /api/v1/auth/sessions/revoke
    pub async fn revoke_sessions(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Extension(session): Extension<UserSession>,
    ) -> Result<Json<RevokeResponse>, ApplicationError> {
        let revoked = lifecycle.revoke_all_sessions(session.user_id).await?;
        Ok(Json(RevokeResponse { revoked }))
    }

    /// POST /api/v1/auth/password/forgot
    ///
    /// Answers 202 whether or not the email belongs to an account.
    pub async fn forgot_password(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Json(body): Json<ForgotPasswordRequest>,
    ) -> Result<StatusCode, ApplicationError> {
        lifecycle.create_password_reset_token(&body.email).await?;
        Ok(StatusCode::ACCEPTED)
    }

    /// POST /api/v1/auth/password/reset
    pub async fn reset_password(
        State(lifecycle): State<Arc<LifecycleManager>>,
        Json(body): Json<ResetPasswordRequest>,
    ) -> Result<StatusCode, ApplicationError> {
        lifecycle.reset_password(&body.token, &body.password).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
