//! HTTP Handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use relay_channels::{
    Channel, InboundText, ReplySender, Update, WebhookPayload, verify_hub_signature,
    verify_secret_token, verify_subscription,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub const HUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: String,
    pub provider_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

const ACK: WebhookAck = WebhookAck { status: "ok" };

// ============================================================================
// Validation
// ============================================================================

/// `userId` accepts a non-empty string or a number
fn require_user_id(body: &Map<String, Value>) -> Result<String, ApiError> {
    match body.get("userId") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ApiError::Validation("userId es requerido".into())),
    }
}

fn require_text(body: &Map<String, Value>, field: &str) -> Result<String, ApiError> {
    match body.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ApiError::Validation(format!("{} debe ser un texto válido", field))),
    }
}

/// Unwrap a JSON object body. Parser output only ever reaches the detail.
fn json_object(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Map<String, Value>, ApiError> {
    match payload {
        Ok(Json(Value::Object(body))) => Ok(body),
        Ok(_) => Err(ApiError::Validation("El cuerpo debe ser un objeto JSON".into())),
        Err(rejection) => Err(ApiError::InvalidBody(rejection.body_text())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.agent.provider();
    let provider_connected = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        provider: provider.name().to_owned(),
        provider_connected,
    })
}

/// `POST /api/agent/message`
pub async fn agent_message(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let body = json_object(payload)?;
    let user_id = require_user_id(&body)?;
    let message = require_text(&body, "message")?;

    let response = state.agent.process_message(&user_id, &message).await?;

    Ok(Json(MessageResponse { response }))
}

/// `POST /api/agent/knowledge`
pub async fn add_knowledge(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<KnowledgeResponse>), ApiError> {
    let knowledge = state.knowledge.clone().ok_or(ApiError::KnowledgeBaseDisabled)?;

    let body = json_object(payload)?;
    let user_id = require_user_id(&body)?;
    let text = require_text(&body, "text")?;
    let metadata = match body.get("metadata") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ApiError::Validation("metadata debe ser un objeto".into())),
    };

    let id = knowledge
        .add_document(&user_id, &text, metadata)
        .await
        .map_err(ApiError::KnowledgeBase)?;

    Ok((StatusCode::CREATED, Json(KnowledgeResponse { id })))
}

/// `GET /api/webhook/whatsapp` subscription handshake
pub async fn whatsapp_verify(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    let expected = state.whatsapp.verify_token.as_deref().unwrap_or("");

    verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        expected,
    )
    .map(str::to_owned)
    .ok_or_else(|| {
        tracing::warn!("WhatsApp webhook verification failed");
        ApiError::Forbidden
    })
}

/// `POST /api/webhook/whatsapp`
pub async fn whatsapp_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    if let Some(secret) = state.whatsapp.app_secret.as_deref() {
        let signature = headers
            .get(HUB_SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        verify_hub_signature(secret, &body, signature).map_err(ApiError::from_channel)?;
    }

    let payload = WebhookPayload::parse(&body).map_err(ApiError::from_channel)?;

    for inbound in payload.text_messages() {
        relay(&state, state.whatsapp.sender.as_ref(), &inbound).await?;
    }

    Ok(Json(ACK))
}

/// `POST /api/webhook/telegram`
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    if let Some(secret) = state.telegram.webhook_secret.as_deref() {
        let received = headers
            .get(TELEGRAM_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        verify_secret_token(secret, received).map_err(ApiError::from_channel)?;
    }

    let update = Update::parse(&body).map_err(ApiError::from_channel)?;

    if let Some(inbound) = update.text_message() {
        relay(&state, state.telegram.sender.as_ref(), &inbound).await?;
    }

    Ok(Json(ACK))
}

/// Run one inbound message through the agent and deliver the reply.
/// Delivery failures are logged; the webhook still succeeds.
async fn relay(
    state: &AppState,
    sender: Option<&Arc<dyn ReplySender>>,
    inbound: &InboundText,
) -> Result<(), ApiError> {
    let reply = state
        .agent
        .process_message(&inbound.user_id, &inbound.text)
        .await
        .map_err(|source| ApiError::Webhook {
            channel: inbound.channel,
            source,
        })?;

    match sender {
        Some(sender) => {
            if let Err(e) = sender.send_reply(&inbound.reply_to, &reply).await {
                tracing::error!(
                    channel = %inbound.channel,
                    user_id = %inbound.user_id,
                    error = %e,
                    "Failed to deliver reply"
                );
            }
        }
        None => log_unsent(inbound.channel, &inbound.user_id, &reply),
    }

    Ok(())
}

fn log_unsent(channel: Channel, user_id: &str, reply: &str) {
    tracing::info!(%channel, user_id, reply, "Reply ready (no outbound client configured)");
}
