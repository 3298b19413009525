// src/server/router.rs
// Router assembly and the serve loop

use super::handlers;
use super::mcp::MnemoMcpServer;
use crate::error::{MnemoError, Result};
use crate::memory::spawn_decay_scheduler;
use crate::session::spawn_eviction_worker;
use crate::state::AppState;
use crate::verbs::Dispatcher;
use axum::routing::{get, post};
use axum::Router;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// All verb paths on one listener; /mcp speaks the MCP streamable-HTTP
/// envelope over the same verb set
pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    let mcp_path = dispatcher.state().config.servers.mcp.clone();
    let mcp_dispatcher = dispatcher.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok::<_, std::io::Error>(MnemoMcpServer::new(mcp_dispatcher.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .route("/tell", post(handlers::tell))
        .route("/ask", post(handlers::ask))
        .route("/augment", post(handlers::augment))
        .route("/remember", post(handlers::remember))
        .route("/recall", post(handlers::recall))
        .route("/forget", post(handlers::forget))
        .route("/zoom", post(handlers::zoom))
        .route("/pan", post(handlers::pan))
        .route("/tilt", post(handlers::tilt))
        .route("/chat", post(handlers::chat))
        .route("/chat/enhanced", post(handlers::chat_enhanced))
        .route("/compose", post(handlers::compose))
        .route("/decompose", post(handlers::decompose))
        .route("/inspect", post(handlers::inspect))
        .route("/zpt/navigate", post(handlers::navigate))
        .route("/state", get(handlers::state))
        .route("/health", get(handlers::health))
        .nest_service(&mcp_path, mcp_service)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(CorsLayer::permissive())
        .with_state(dispatcher)
}

/// Bind, spawn the background workers, and serve until ctrl-c.
/// Shutdown drains sessions (emitting closing quads) before returning.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::new(state.clone()));
    let router = build_router(dispatcher);

    // MNEMO_BACKGROUND=0 disables the tick workers (cron-driven setups)
    let background = crate::config::parse_bool_env("MNEMO_BACKGROUND").unwrap_or(true);
    let mut workers = Vec::new();
    if background {
        workers.push(spawn_decay_scheduler(
            state.memory.clone(),
            Duration::from_secs(state.config.memory.decay_tick_secs.max(1)),
        ));
        workers.push(spawn_eviction_worker(
            state.sessions.clone(),
            state.memory.clone(),
            Duration::from_secs(state.config.session.eviction_tick_secs.max(1)),
        ));
    }

    let addr = format!("{}:{}", state.config.servers.bind, state.config.servers.http);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MnemoError::Internal(format!("bind {addr}: {e}")))?;
    info!(%addr, mcp = %state.config.servers.mcp, "mnemo serving");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| MnemoError::Internal(format!("server error: {e}")))?;

    for worker in workers {
        worker.abort();
    }
    let closed = state.sessions.evict_all(&state.memory).await;
    info!(sessions = closed, "drained sessions, shutdown complete");
    Ok(())
}
