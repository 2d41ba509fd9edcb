//! API Error Responses
//!
//! Every error renders as `{error, code}`. The internal cause rides along in
//! an [`ErrorDetail`] extension; [`render_error_details`] swaps it into the
//! body as `message` when the state allows it.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use relay_channels::{Channel, ChannelError};
use relay_core::AgentError;
use serde::Serialize;
use thiserror::Error;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Malformed request body: {0}")]
    InvalidBody(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid webhook: {0}")]
    InvalidWebhook(ChannelError),

    #[error("Webhook signature rejected: {0}")]
    WebhookSignature(ChannelError),

    #[error(transparent)]
    Processing(#[from] AgentError),

    #[error("{channel} webhook failed: {source}")]
    Webhook {
        channel: Channel,
        #[source]
        source: AgentError,
    },

    #[error("Knowledge base is not configured")]
    KnowledgeBaseDisabled,

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(AgentError),
}

impl ApiError {
    /// Sort a channel parse/verify failure into the right response
    pub fn from_channel(err: ChannelError) -> Self {
        match err {
            ChannelError::Signature(_) => ApiError::WebhookSignature(err),
            _ => ApiError::InvalidWebhook(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody(_) | ApiError::InvalidWebhook(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized | ApiError::WebhookSignature(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::KnowledgeBaseDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Processing(_) | ApiError::Webhook { .. } | ApiError::KnowledgeBase(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::InvalidWebhook(_) => "INVALID_WEBHOOK",
            ApiError::WebhookSignature(_) => "INVALID_SIGNATURE",
            ApiError::Processing(_) => "AGENT_ERROR",
            ApiError::Webhook { .. } => "WEBHOOK_ERROR",
            ApiError::KnowledgeBaseDisabled => "KNOWLEDGE_BASE_DISABLED",
            ApiError::KnowledgeBase(_) => "KNOWLEDGE_BASE_ERROR",
        }
    }

    /// Text safe to show any caller
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::InvalidBody(_) => "Cuerpo de la petición inválido".into(),
            ApiError::Unauthorized => "Unauthorized".into(),
            ApiError::Forbidden => "Forbidden".into(),
            ApiError::InvalidWebhook(e) | ApiError::WebhookSignature(e) => e.user_message().into(),
            ApiError::Processing(_) => "Error al procesar el mensaje".into(),
            ApiError::Webhook { channel, .. } => {
                format!("Error al procesar webhook de {}", channel.label())
            }
            ApiError::KnowledgeBaseDisabled => "Base de conocimiento no disponible".into(),
            ApiError::KnowledgeBase(_) => "Error al guardar el documento".into(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ApiError::InvalidBody(reason) => Some(reason.clone()),
            ApiError::InvalidWebhook(e) | ApiError::WebhookSignature(e) => Some(e.to_string()),
            ApiError::Processing(e)
            | ApiError::Webhook { source: e, .. }
            | ApiError::KnowledgeBase(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.public_message(),
            code: self.code(),
            message: None,
        };
        let detailed = self.detail().map(|message| ErrorResponse {
            message: Some(message),
            ..body.clone()
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(detailed) = detailed {
            response.extensions_mut().insert(ErrorDetail(detailed));
        }
        response
    }
}

/// Full error body, including the internal cause
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub ErrorResponse);

/// Replace error bodies with their detailed form when
/// `AppState::expose_error_details` is set. The extension never leaves the
/// process either way.
pub async fn render_error_details(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(ErrorDetail(detailed)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    if state.expose_error_details {
        return (response.status(), Json(detailed)).into_response();
    }
    response
}
