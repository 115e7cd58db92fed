use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use chat_api_server::config::Settings;
use chat_api_server::services::conversation::spawn_retention_sweeper;
use chat_api_server::{build_router, logging, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (.env, config/settings.toml, APP__*, OPENAI_API_KEY, PORT)
    let settings = Settings::load()?;

    // Initialize logging
    let _log_guard = logging::init_tracing(&settings.logging)?;

    info!("🚀 Starting Chat API Server...");
    info!(
        model = %settings.llm.model,
        history_window = settings.conversation.history_window,
        max_attempts = settings.retry.max_attempts,
        strict_status_codes = settings.server.strict_status_codes,
        "✅ Configuration loaded"
    );

    if settings.llm.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; upstream calls will be rejected by the provider");
    }

    let state = AppState::from_settings(&settings)?;

    if let Some(ttl) = settings.conversation.idle_ttl_seconds {
        spawn_retention_sweeper(
            state.conversation_manager.store().clone(),
            Duration::from_secs(settings.conversation.sweep_interval_seconds),
        );
        info!("✅ Idle conversations expire after {}s", ttl);
    }

    let app = build_router(state);

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
