//! JWT authentication middleware.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::config::BEARER_TOKEN_PREFIX;
use crate::errors::AppError;
use crate::services::Claims;

/// Authenticated employee extracted from the JWT
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl CurrentUser {
    pub fn is_privileged(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            is_staff: claims.is_staff,
            is_superuser: claims.is_superuser,
        }
    }
}

/// Validates the bearer token and injects [`CurrentUser`] into the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix(BEARER_TOKEN_PREFIX)
        .ok_or(AppError::Unauthorized)?;

    let claims = state.auth_service.verify_token(token)?;
    request.extensions_mut().insert(CurrentUser::from(claims));

    Ok(next.run(request).await)
}

/// Staff or superuser, otherwise Forbidden.
pub fn require_staff(user: &CurrentUser) -> Result<(), AppError> {
    if user.is_privileged() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
