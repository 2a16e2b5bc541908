//! HTTP surface: REST endpoints plus SSE streaming.

pub mod error;
pub mod handlers;
pub mod stream;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::{FeedConfig, RunController};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
    pub feed_config: FeedConfig,
}

/// Build the API router
pub fn create_router(controller: Arc<RunController>, feed_config: FeedConfig) -> Router {
    let state = AppState {
        controller,
        feed_config,
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/runs", post(handlers::create_run))
        .route("/runs/:id", get(handlers::get_run))
        .route("/runs/:id/stream", get(stream::stream_run))
        .route("/runs/:id/resume", post(handlers::resume_run))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits
pub async fn serve(
    controller: Arc<RunController>,
    feed_config: FeedConfig,
    bind_addr: &str,
) -> anyhow::Result<()> {
    let router = create_router(controller, feed_config);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "Serving HTTP API");
    axum::serve(listener, router).await?;
    Ok(())
}
