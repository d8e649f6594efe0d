//! Public account handlers: registration, login, password recovery and
//! reset, and email confirmation.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{EmployeeResponse, Registration};
use crate::errors::AppResult;
use crate::services::TokenResponse;
use crate::types::{Created, MessageResponse};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecoveryRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
}

/// Second step of a password reset: the emailed token and the new password.
#[derive(Debug, Deserialize, Validate)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1, message = "This field may not be blank"))]
    pub token: String,
    pub password: String,
    #[validate(must_match(other = "password", message = "The two password fields didn't match"))]
    pub password_confirm: String,
}

/// Routes that carry the stricter rate limit.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/registration/", post(register))
        .route("/authorization/", post(login))
        .route("/password-recovery/", post(recover_password))
        .route("/password-reset/", post(request_password_reset))
        .route("/password-change/", post(change_password))
}

/// Activation links are opened from mail clients, so no bearer token.
pub fn activation_routes() -> Router<AppState> {
    Router::new().route("/profile/email-confirm/:token/", get(confirm_email))
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<Registration>,
) -> AppResult<Created<EmployeeResponse>> {
    let employee = state.account_service.register(payload).await?;
    Ok(Created(EmployeeResponse::from(employee)))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state
        .auth_service
        .login(payload.email, payload.password)
        .await?;

    Ok(Json(token))
}

pub async fn recover_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RecoveryRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.account_service.recover_password(payload.email).await?;
    Ok(Json(MessageResponse::new(
        "A new password has been sent to your email",
    )))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RecoveryRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .account_service
        .request_password_reset(payload.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "If the address belongs to an active account, a reset link has been sent to it",
    )))
}

pub async fn change_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<PasswordChangeRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .account_service
        .confirm_password_reset(&payload.token, payload.password)
        .await?;
    Ok(Json(MessageResponse::new(
        "Your password has been changed, you can now sign in",
    )))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state.account_service.redeem(&token).await?;
    Ok(Json(EmployeeResponse::from(employee)))
}
