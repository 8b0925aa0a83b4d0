//! HTTP surface: the chat ingestion endpoint, health probes, and metrics.

pub mod chat;
pub mod health;
pub mod metrics;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
