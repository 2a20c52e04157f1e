//! Chip read and delete endpoints.
//!
//! Each handler runs one statement through the retrying executor.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::initialization::AppContext;
use crate::server::error::ApiError;
use crate::storage::{delete_chip, get_chip, list_chips, Chip};

/// GET /chips
async fn list(State(ctx): State<AppContext>) -> Result<Json<Vec<Chip>>, ApiError> {
    Ok(Json(list_chips(&ctx.executor).await?))
}

/// GET /chips/{id}
async fn show(State(ctx): State<AppContext>, Path(id): Path<i64>) -> Result<Json<Chip>, ApiError> {
    get_chip(&ctx.executor, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound { id })
}

/// DELETE /chips/{id}
async fn remove(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> Result<Json<Chip>, ApiError> {
    delete_chip(&ctx.executor, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound { id })
}

pub fn router() -> Router<AppContext> {
    Router::new()
        .route("/chips", get(list))
        .route("/chips/{id}", get(show).delete(remove))
}
