pub mod explain;
pub mod extract;
pub mod generate;
pub mod stream;
pub mod types;

use axum::routing::post;
use axum::{Json, Router};

use crate::server::state::AppState;
use types::HealthResponse;

/// Build the relay API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/explain", post(explain::handler))
        .route("/generate", post(generate::handler))
}

/// GET /health - Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
