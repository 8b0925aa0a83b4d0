use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::ChatEvent;
use crate::errors::ServiceError;
use crate::notifications::OutboundMessage;
use crate::{ApiResponse, AppState};

/// Everything the transport adapter should deliver for one handled event,
/// in order. Messages addressed to third parties (payment alerts,
/// fulfillment) go out through the notification channel instead and never
/// appear here.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub messages: Vec<OutboundMessage>,
}

/// POST /api/v1/chat/events — the single conversational ingestion point.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChatEvent>,
) -> Result<Json<ApiResponse<ChatReply>>, ServiceError> {
    let messages = state.dispatcher.handle(event).await?;
    Ok(Json(ApiResponse::success(ChatReply { messages })))
}

pub fn chat_routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", post(handle_event))
}
