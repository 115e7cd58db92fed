use crate::config::ServerConfig;
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::ConversationManager;
use crate::utils::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// `POST /chat`
///
/// Upstream failures are answered with `{"error": ...}` and HTTP 200 unless
/// `server.strict_status_codes` is enabled.
pub async fn chat_handler(
    State(manager): State<Arc<ConversationManager>>,
    State(server): State<Arc<ServerConfig>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("chat", %request_id, user_id = %request.user_id);

    async move {
        info!(message_len = request.message.len(), "Chat request received");

        match manager.handle_message(&request.user_id, request.message).await {
            Ok(reply) => Ok(Json(ChatResponse::Reply { reply })),
            Err(e) if server.strict_status_codes => Err(ApiError::from(e)),
            Err(e) => Ok(Json(ChatResponse::Error {
                error: e.client_message(),
            })),
        }
    }
    .instrument(span)
    .await
}
