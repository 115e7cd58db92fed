use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::chat::ChatResponse;

/// Client-visible text once the retry budget is spent on throttling.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit reached. Please wait and try again later.";

/// Failure contract of the upstream completion call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider throttled a single attempt. Retryable.
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Every attempt in the retry budget was throttled.
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// Anything else the provider (or the transport) reported. Never retried.
    #[error("{0}")]
    Upstream(String),
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::RateLimitExhausted { .. })
    }

    /// Text placed in the `{"error": ...}` body returned to chat clients.
    pub fn client_message(&self) -> String {
        match self {
            Self::RateLimited(_) | Self::RateLimitExhausted { .. } => RATE_LIMIT_MESSAGE.to_string(),
            Self::Upstream(msg) => format!("OpenAI API Error: {}", msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        if err.is_rate_limit() {
            ApiError::RateLimited(err.client_message())
        } else {
            ApiError::Upstream(err.client_message())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::RateLimited(msg) => {
                tracing::warn!("Rate limited: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, msg)
            }
            ApiError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
        };

        // Same envelope as the 200-status error replies, only the status differs.
        (status, Json(ChatResponse::Error { error: message })).into_response()
    }
}
