use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::upstream::Upstream;

// --- Modules ---
pub mod blob;
pub mod catalog;
pub mod config;
pub mod console;
pub mod daemon;
pub mod error;
pub mod executor;
pub mod form;
pub mod handlers;
pub mod history;
pub mod identifier;
pub mod link;
pub mod models;
pub mod normalize;
pub mod render;
pub mod session;
pub mod template;
pub mod upstream;

/// Request-independent state shared by the proxy handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Upstream,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(AppState {
            upstream: Upstream::new(&config.upstream)?,
        })
    }
}

/// The proxy's HTTP surface. OPTIONS requests are answered by the CORS layer.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS]);

    Router::new()
        .route("/api/download/ytmp3", get(handlers::ytmp3))
        .route("/api/ping", get(handlers::ping))
        .layer(cors)
        .with_state(state)
}
