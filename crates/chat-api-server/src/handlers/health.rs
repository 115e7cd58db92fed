use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json};

use crate::config::ServerConfig;
use crate::models::chat::{BannerResponse, HealthResponse};

/// `GET /`
pub async fn banner(State(server): State<Arc<ServerConfig>>) -> Json<BannerResponse> {
    Json(BannerResponse {
        message: server.banner.clone(),
    })
}

/// `HEAD /` and `HEAD /healthcheck`: liveness probe, no body
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// `GET /healthcheck`: keeps the service warm behind idle-suspending hosts
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
