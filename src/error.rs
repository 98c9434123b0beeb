//! Error types shared across the service
//!
//! The storage layer reports [`StoreError`]; handlers work in terms of
//! [`AppError`], which maps onto the HTTP surface. Storage detail never
//! reaches the client body, only the server log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures raised by the redb-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Open(#[from] redb::DatabaseError),

    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),

    #[error(transparent)]
    Table(#[from] redb::TableError),

    #[error(transparent)]
    Access(#[from] redb::StorageError),

    #[error(transparent)]
    Commit(#[from] redb::CommitError),

    /// A stored value failed to parse back into its record type.
    #[error("stored record is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Code generation kept colliding with existing entries.
    #[error("no free short code found after {0} attempts")]
    CodeSpaceExhausted(u32),

    /// The requested short code already points at a different video. Kept
    /// separate from the write failures above so the API can answer 409
    /// instead of 500.
    #[error("short code '{0}' is already in use")]
    CodeTaken(String),
}

/// Application-level error, one variant per HTTP outcome.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("link not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("short code '{0}' is already in use")]
    CodeTaken(String),

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CodeTaken(code) => AppError::CodeTaken(code),
            other => AppError::Storage(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "link not found".to_string()),
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::CodeTaken(code) => (
                StatusCode::CONFLICT,
                format!("short code '{}' is already in use", code),
            ),
            AppError::Storage(err) => {
                error!("storage failure: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal storage error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
