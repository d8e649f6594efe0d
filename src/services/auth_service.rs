//! Authentication service - login and bearer token verification.
//!
//! Password hashing lives in the domain `Password` value object; this
//! service only decides who gets a token.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::validation::normalize_email;
use crate::domain::{Employee, Password};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// JWT claims payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials of an active employee for a bearer token.
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Verify a bearer token and extract its claims.
    fn verify_token(&self, token: &str) -> AppResult<Claims>;
}

/// Sign a token for `employee`.
pub fn issue_token(employee: &Employee, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: employee.id,
        email: employee.email.clone(),
        is_staff: employee.is_staff,
        is_superuser: employee.is_superuser,
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn decode_token(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(uow: Arc<U>, config: Config) -> Self {
        Self { uow, config }
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let found = self
            .uow
            .employees()
            .find_by_email(&normalize_email(&email))
            .await?;

        // Unknown emails still pay for one hash verification.
        let stored = match &found {
            Some(employee) => Password::from_hash(employee.password_hash.as_str()),
            None => Password::dummy(),
        };
        let password_valid = stored.verify(&password);

        match found {
            Some(employee) if password_valid && employee.is_active => {
                tracing::info!(employee = %employee.id, "Employee logged in");
                issue_token(&employee, &self.config)
            }
            _ => Err(AppError::InvalidCredentials),
        }
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        decode_token(token, &self.config)
    }
}
