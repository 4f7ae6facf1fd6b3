//! API Server for Browser Pilot
//!
//! HTTP entry point: session CRUD, task submission, live event streaming
//! over SSE, and screenshot serving.

mod config;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=debug,agent_runtime=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Using data directory: {:?}", config.data_dir);
    tracing::info!("Agent mode: {:?}", config.agent_mode);

    let state = AppState::new(config.clone());

    start_idle_sweeper(&state);

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::sessions::router())
        .merge(routes::stream::router())
        .merge(routes::files::router())
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::info!("API listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind API address");
    axum::serve(listener, app).await.expect("Server error");
}

/// Periodically evict session runtimes that have been idle too long
fn start_idle_sweeper(state: &AppState) {
    let registry = Arc::clone(state.registry());
    let max_idle = state.config().session_idle_timeout;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            registry.sweep_idle(max_idle);
        }
    });
}
