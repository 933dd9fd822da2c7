//! Error types for the library server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
///
/// Conflict-type lending failures (`Unavailable`, `AlreadyBorrowed`,
/// `NotReturnable`) keep their own variants but answer with 404, which is
/// what existing clients of the lending endpoints expect.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing image: {0}")]
    MissingAsset(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Already borrowed: {0}")]
    AlreadyBorrowed(String),

    #[error("Not returnable: {0}")]
    NotReturnable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::MissingAsset(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound(_)
            | AppError::Unavailable(_)
            | AppError::AlreadyBorrowed(_)
            | AppError::NotReturnable(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client; internal failures never leak details
    pub fn public_message(&self) -> String {
        match self {
            AppError::Authentication(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::MissingAsset(msg)
            | AppError::NotFound(msg)
            | AppError::Unavailable(msg)
            | AppError::AlreadyBorrowed(msg)
            | AppError::NotReturnable(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg) => msg.clone(),
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            _ => {}
        }

        let status = self.status_code();
        let body = Json(ErrorResponse {
            message: self.public_message(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lending_conflicts_answer_not_found() {
        for err in [
            AppError::Unavailable("x".into()),
            AppError::AlreadyBorrowed("x".into()),
            AppError::NotReturnable("x".into()),
            AppError::NotFound("x".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn validation_failures_are_unprocessable() {
        assert_eq!(
            AppError::Validation("short".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::MissingAsset("none".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal("disk on fire at /var/lib".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "Database error");
    }
}
