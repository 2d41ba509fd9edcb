//! chat-relay HTTP Server
//!
//! Loads settings, wires the orchestrator to its provider, knowledge base and
//! channel clients, then serves the API.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_server::{
    Settings,
    bootstrap::{Services, build_services},
    build_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let Services {
        state,
        knowledge_base,
    } = build_services(&settings)?;

    // Verify provider connection
    let provider = state.agent.provider();
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to {}", provider.name());
            if let Ok(models) = provider.list_models().await {
                tracing::debug!(count = models.len(), "Models available");
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not reachable - messages will fail until it is", provider.name());
        }
    }

    // Knowledge base
    match &knowledge_base {
        Some(kb) => match kb.ensure_collection().await {
            Ok(true) => tracing::info!("✓ Created collection '{}'", kb.collection()),
            Ok(false) => tracing::info!("✓ Using collection '{}'", kb.collection()),
            Err(e) => {
                tracing::warn!("⚠ Qdrant unavailable ({}) - replies will run without context", e);
            }
        },
        None => tracing::info!("Knowledge base disabled"),
    }

    tracing::info!("Registered {} tools:", state.agent.tools().len());
    for name in state.agent.tools().names() {
        tracing::info!("  • {}", name);
    }

    if state.service_api_key.is_none() {
        tracing::warn!("⚠ SERVICE_API_KEY not set - /api/agent requests will be rejected");
    }
    if state.whatsapp.sender.is_none() {
        tracing::info!("WhatsApp replies will be logged only");
    }
    if state.telegram.sender.is_none() {
        tracing::info!("Telegram replies will be logged only");
    }

    let app = build_router(state);

    // Start server
    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 chat-relay running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                - Health check");
    tracing::info!("  POST /api/agent/message     - Process a message");
    tracing::info!("  POST /api/agent/knowledge   - Store customer context");
    tracing::info!("  GET  /api/webhook/whatsapp  - WhatsApp verification");
    tracing::info!("  POST /api/webhook/whatsapp  - WhatsApp webhook");
    tracing::info!("  POST /api/webhook/telegram  - Telegram webhook");

    axum::serve(listener, app).await?;

    Ok(())
}
