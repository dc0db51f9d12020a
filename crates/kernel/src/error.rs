//! Application error types.
//!
//! Every failure leaving a handler is rendered as
//! `{"success": false, "error": "<message>"}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::{ModelError, ValidationErrors};
use crate::query::QueryError;
use crate::services::photo::PhotoError;
use crate::store::StoreError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("store error")]
    Store(#[from] StoreError),

    #[error("query failed")]
    Query(#[from] QueryError),
}

impl AppError {
    /// Shorthand for the 404 raised when a path id names nothing.
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{what} not found with id of {id}"))
    }

    /// The 401 returned by every protected route without a valid token.
    pub fn not_authorized() -> Self {
        AppError::Unauthorized("Not authorized to access this route".to_string())
    }
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(errors) => AppError::Validation(errors),
            ModelError::Store(e) => AppError::Store(e),
            ModelError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl From<PhotoError> for AppError {
    fn from(e: PhotoError) -> Self {
        match e {
            PhotoError::Io(e) => AppError::Internal(e),
            rejected => AppError::BadRequest(rejected.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, errors.to_string()),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Store(e) => store_error_response(e),
            AppError::Query(QueryError::Store(e)) => store_error_response(e),
            AppError::Query(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, Json(body)).into_response()
    }
}

fn store_error_response(error: StoreError) -> (StatusCode, String) {
    match error {
        StoreError::Duplicate => (
            StatusCode::BAD_REQUEST,
            "Duplicate field value entered".to_string(),
        ),
        e @ StoreError::InvalidValue { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
        e => {
            tracing::error!(error = %e, "store error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server Error".to_string())
        }
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_maps_to_bad_request() {
        let response = AppError::Store(StoreError::Duplicate).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn query_store_failure_is_server_error() {
        let err = AppError::Query(QueryError::Store(StoreError::Corrupt("x".into())));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn malformed_filter_is_bad_request() {
        let err = AppError::Query(QueryError::InvalidField("$where".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_message() {
        let err = AppError::not_found("Bootcamp", "abc");
        assert_eq!(err.to_string(), "Bootcamp not found with id of abc");
    }
}
