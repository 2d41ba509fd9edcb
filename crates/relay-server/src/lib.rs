//! # relay-server
//!
//! Axum front door for the relay orchestrator.
//!
//! ```text
//! GET  /health                  provider status
//! POST /api/agent/message       x-api-key, {userId, message} -> {response}
//! POST /api/agent/knowledge     x-api-key, {userId, text, metadata?} -> {id}
//! GET  /api/webhook/whatsapp    subscription handshake
//! POST /api/webhook/whatsapp    inbound WhatsApp messages
//! POST /api/webhook/telegram    inbound Telegram updates
//! ```

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::{ConfigError, Settings};
pub use error::ApiError;
pub use state::AppState;

use crate::auth::require_api_key;
use crate::error::render_error_details;
use crate::handlers::{
    add_knowledge, agent_message, health_check, telegram_webhook, whatsapp_verify,
    whatsapp_webhook,
};

/// Assemble the full router
pub fn build_router(state: AppState) -> Router {
    let agent_routes = Router::new()
        .route("/message", post(agent_message))
        .route("/knowledge", post(add_knowledge))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let webhook_routes = Router::new()
        .route("/whatsapp", get(whatsapp_verify).post(whatsapp_webhook))
        .route("/telegram", post(telegram_webhook));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/agent", agent_routes)
        .nest("/api/webhook", webhook_routes)
        .layer(middleware::from_fn_with_state(state.clone(), render_error_details))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
