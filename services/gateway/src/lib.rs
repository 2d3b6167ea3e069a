//! HTTP gateway for the tutor: `/api/chat` proxies OpenAI chat completions,
//! `/api/tts` proxies Eleven Labs text-to-speech.

pub mod config;
mod error;
mod routes;
mod state;

pub use state::{AppState, ElevenLabsSettings, OpenAiSettings};

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    // Any origin may call the gateway; the browser front end is served elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(routes::chat::chat))
        .route("/api/tts", post(routes::tts::tts))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(Arc::new(state))
}
