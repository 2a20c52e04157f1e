//! API errors and their JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;

use crate::error_handling::{DatabaseError, ImportError};

#[derive(Debug)]
pub enum ApiError {
    /// Import aborted as a whole (400 for bad input, 500 for the store).
    Import(ImportError),

    /// A simple read or delete failed (500).
    Database(DatabaseError),

    /// No chip with that id (404).
    NotFound { id: i64 },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Import(ImportError::EmptyBatch) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Empty file or no valid rows" }),
            ),
            Self::Import(ImportError::InvalidPayload(reason)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Invalid chip list: {reason}") }),
            ),
            Self::Import(ImportError::Database(e)) => {
                error!("Import failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Import failed", "details": e.to_string() }),
                )
            }
            Self::Database(e) => {
                error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error", "details": e.to_string() }),
                )
            }
            Self::NotFound { id } => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Chip {id} not found") }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        Self::Import(e)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        Self::Database(e)
    }
}
