//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::initialization::AppContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Whether a database session is currently cached. Checking never connects.
    pub database: &'static str,
}

/// GET /health
async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let database = if ctx.manager.is_connected().await {
        "connected"
    } else {
        "idle"
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

pub fn router() -> Router<AppContext> {
    Router::new().route("/health", get(health))
}
