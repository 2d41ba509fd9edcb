//! API Key Middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `x-api-key` does not match the configured service key
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match (state.service_api_key.as_deref(), provided) {
        (Some(expected), Some(provided)) if expected == provided => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "Unauthorized API access attempt");
            Err(ApiError::Unauthorized)
        }
    }
}
