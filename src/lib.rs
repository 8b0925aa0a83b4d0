//! Storefront API Library
//!
//! Core functionality for the conversational storefront: catalog browsing,
//! carts, chat-driven checkout with crypto payment capture, and the
//! operator panel that resolves paid orders.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod admin;
pub mod chat;
pub mod checkout;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod notifications;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub dispatcher: Arc<chat::Dispatcher>,
}

// Common response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Builds the application router: chat ingestion, health probes, and
/// metrics, with HTTP tracing on every route. CORS is layered on by the
/// binary, which knows the deployment's origin policy.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "storefront-api up" }))
        .route("/metrics", get(handlers::metrics::export_metrics))
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1/chat", handlers::chat::chat_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data() {
        let body = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"][1], 2);
        assert!(body.get("error").is_none());
    }

    #[test]
    fn error_envelope_skips_data() {
        let body = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "nope");
        assert!(body.get("data").is_none());
    }
}
