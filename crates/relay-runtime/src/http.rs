//! Shared HTTP plumbing for the provider and vector-store clients.

use std::time::Duration;

use relay_core::{AgentError, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

/// Build a client with the given request timeout
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("HTTP client: {}", e)))
}

/// Classify a transport-level failure
pub(crate) fn transport_error(service: &str, err: &reqwest::Error) -> AgentError {
    if err.is_connect() || err.is_timeout() {
        AgentError::ProviderUnavailable(format!("{}: {}", service, err))
    } else {
        AgentError::Provider(format!("{}: {}", service, err))
    }
}

/// Classify a non-success status
pub(crate) fn status_error(service: &str, status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{} returned {}: {}", service, status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

/// Read a JSON body, turning non-2xx statuses into errors
pub(crate) async fn json_body(service: &str, response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(service, status, &body));
    }
    response
        .json()
        .await
        .map_err(|e| AgentError::Provider(format!("{}: malformed response: {}", service, e)))
}
