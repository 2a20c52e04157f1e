//! Bulk import endpoints.
//!
//! - `POST /chips/import`: spreadsheet body (CSV, XLSX or XLS), header row first
//! - `POST /chips/bulk`: JSON array of chip objects
//!
//! Both render the outcome the same way: 201 when at least one row was
//! committed (with `errors` listing skipped rows, if any), 400 with the full
//! error list when nothing was.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::config::MAX_UPLOAD_BYTES;
use crate::error_handling::ImportError;
use crate::import::{rows_from_json, rows_from_upload, ImportOutcome, RowError, SourceRow};
use crate::initialization::AppContext;
use crate::server::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportedResponse {
    imported: usize,
    imported_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<RowError>,
}

#[derive(Serialize)]
struct RejectedResponse {
    error: &'static str,
    errors: Vec<RowError>,
}

fn render(outcome: ImportOutcome) -> Response {
    if outcome.committed() {
        (
            StatusCode::CREATED,
            Json(ImportedResponse {
                imported: outcome.imported_count,
                imported_ids: outcome.imported_ids,
                errors: outcome.errors,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(RejectedResponse {
                error: "No chips were imported",
                errors: outcome.errors,
            }),
        )
            .into_response()
    }
}

async fn run(ctx: &AppContext, rows: Vec<SourceRow>) -> Result<Response, ApiError> {
    let outcome = ctx.importer.import_batch(&rows).await?;
    Ok(render(outcome))
}

/// POST /chips/import
async fn import_spreadsheet(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let rows = rows_from_upload(content_type, &body)?;
    run(&ctx, rows).await
}

/// POST /chips/bulk
async fn import_bulk(State(ctx): State<AppContext>, body: Bytes) -> Result<Response, ApiError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ImportError::InvalidPayload(e.to_string()))?;
    let rows = rows_from_json(&payload)?;
    run(&ctx, rows).await
}

pub fn router() -> Router<AppContext> {
    Router::new()
        .route(
            "/chips/import",
            post(import_spreadsheet).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/chips/bulk", post(import_bulk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::RowRejection;
    use crate::import::RowOutcome;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn full_success_omits_errors() {
        let outcome: ImportOutcome = [RowOutcome::Inserted(1), RowOutcome::Inserted(2)]
            .into_iter()
            .collect();
        let response = render(outcome);
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["imported"], 2);
        assert_eq!(body["importedIds"], serde_json::json!([1, 2]));
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn partial_success_is_201_with_errors() {
        let outcome: ImportOutcome = [
            RowOutcome::Inserted(1),
            RowOutcome::Rejected(RowError::new(3, RowRejection::MissingNumber)),
        ]
        .into_iter()
        .collect();
        let response = render(outcome);
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["row"], 3);
        assert_eq!(body["errors"][0]["message"], "number is required");
    }

    #[tokio::test]
    async fn nothing_imported_is_400() {
        let outcome: ImportOutcome =
            [RowOutcome::Rejected(RowError::new(2, RowRejection::MissingNumber))]
                .into_iter()
                .collect();
        let response = render(outcome);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "No chips were imported");
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
    }
}
