use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;

use crate::AppState;

/// Basic liveness probe - just checks if the service is running
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe - checks the database answers before traffic is routed
/// to this instance.
async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check_start = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let db_latency = check_start.elapsed().as_millis() as u64;

    match db_result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "checks": {
                    "database": {
                        "status": "up",
                        "latency_ms": db_latency
                    }
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "checks": {
                    "database": {
                        "status": "down",
                        "error": e.to_string()
                    }
                }
            })),
        ),
    }
}

/// Creates the router for health check endpoints
///
/// Endpoints:
/// - GET /health       - Basic liveness probe (always returns 200 if the server is running)
/// - GET /health/ready - Readiness probe (checks database connectivity)
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(liveness_check))
        .route("/ready", get(readiness_check))
}
