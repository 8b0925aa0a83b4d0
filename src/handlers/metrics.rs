use axum::{http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use tracing::error;

/// GET /metrics — Prometheus text exposition of the default registry.
pub async fn export_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("metrics error"),
        );
    }

    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Metrics exposition was not valid UTF-8");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics error"),
            )
        }
    }
}
