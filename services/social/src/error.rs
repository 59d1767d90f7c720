//! Custom error types for the social service

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the social service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Email already in use.")]
    EmailExists,

    #[error("User with this name already exists.")]
    UsernameExists,

    #[error("Passwords not identical!")]
    PasswordMismatch,

    #[error("{0}")]
    InvalidInput(String),

    #[error("User not found - {0}")]
    UserNotFound(String),

    #[error(
        "There was a problem with sending an activation email. Please register again or contact support"
    )]
    MailDelivery,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is not activated")]
    AccountDisabled,

    #[error("Account is already activated")]
    AlreadyActive,

    #[error("Users cannot follow themselves")]
    SelfFollow,

    #[error("Already following this user")]
    AlreadyFollowing,

    #[error("Not following this user")]
    NotFollowing,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::InvalidInput(rejection.body_text())
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::PasswordMismatch | ServiceError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::InvalidCredentials | ServiceError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::AccountDisabled => StatusCode::FORBIDDEN,
            ServiceError::UserNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::EmailExists
            | ServiceError::UsernameExists
            | ServiceError::AlreadyActive
            | ServiceError::SelfFollow
            | ServiceError::AlreadyFollowing
            | ServiceError::NotFollowing => StatusCode::CONFLICT,
            ServiceError::MailDelivery => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            ServiceError::Database(e) => {
                error!("Database error: {}", e);
                "Database error".to_string()
            }
            ServiceError::Internal(e) => {
                error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for service results
pub type ServiceResult<T> = Result<T, ServiceError>;
