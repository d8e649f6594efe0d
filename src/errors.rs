//! Centralized error handling.
//!
//! Provides a unified error type for the entire application,
//! with automatic HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::domain::validation::{FieldErrors, NON_FIELD_ERRORS};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication & Authorization
    #[error("Authentication required")]
    Unauthorized,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    // Validation
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Unique or referential constraint violated.
    #[error("{message}")]
    Integrity { field: String, message: String },

    #[error("Invalid input: {0}")]
    BadRequest(String),

    // External service errors
    #[error("Database error")]
    Database(DbErr),

    #[error("Authentication error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<FieldErrors>,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::NotFound => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Integrity { .. } => "INTEGRITY_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Jwt(_) => "AUTH_ERROR",
            AppError::Mail(_) => "MAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidCredentials | AppError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Integrity { .. } | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    fn user_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Integrity { message, .. } => message.clone(),

            // Hide details for internal/security errors
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                "Invalid or expired token".to_string()
            }
            AppError::Mail(msg) => {
                tracing::error!("Mail error: {}", msg);
                "The email could not be sent, please try again later".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            _ => self.to_string(),
        }
    }

    /// Field-level details attached to the response body.
    fn details(&self) -> Option<FieldErrors> {
        match self {
            AppError::Validation(errors) => Some(errors.clone()),
            AppError::Integrity { field, message } => {
                Some(FieldErrors::single(field.clone(), message.clone()))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Maps constraint violations reported by the database to integrity errors.
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                let field = constraint_field(&detail);
                AppError::Integrity {
                    message: format!("A record with this {} already exists", field.replace('_', " ")),
                    field,
                }
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::Integrity {
                field: NON_FIELD_ERRORS.to_string(),
                message: "The record is still referenced by other records".to_string(),
            },
            _ => AppError::Database(err),
        }
    }
}

/// Guess the offending column from a driver constraint message.
fn constraint_field(detail: &str) -> String {
    ["code_of_project", "email", "phone"]
        .into_iter()
        .find(|column| detail.contains(column))
        .unwrap_or(NON_FIELD_ERRORS)
        .to_string()
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    /// Validation failure not tied to one field.
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(NON_FIELD_ERRORS, msg))
    }

    /// Validation failure on a single field.
    pub fn invalid_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, msg))
    }

    /// Duplicate value on a unique field.
    pub fn duplicate(field: &str) -> Self {
        AppError::Integrity {
            field: field.to_string(),
            message: format!("A record with this {} already exists", field.replace('_', " ")),
        }
    }

    pub fn mail(msg: impl Into<String>) -> Self {
        AppError::Mail(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
