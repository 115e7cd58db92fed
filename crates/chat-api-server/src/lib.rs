pub mod config;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.server.body_limit_bytes;

    Router::new()
        .route("/", get(handlers::health::banner).head(handlers::health::liveness))
        .route(
            "/healthcheck",
            get(handlers::health::health_check).head(handlers::health::liveness),
        )
        .route("/chat", post(handlers::chat::chat_handler))
        .with_state(state)
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(DefaultBodyLimit::max(body_limit))
}

