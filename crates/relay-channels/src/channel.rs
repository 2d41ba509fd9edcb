//! Channel-neutral types shared by the WhatsApp and Telegram integrations

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};

/// Messaging channel a message arrived on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    WhatsApp,
    Telegram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Telegram => "telegram",
        }
    }

    /// Human-facing name
    pub fn label(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "WhatsApp",
            Channel::Telegram => "Telegram",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text message ready to hand to the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundText {
    pub channel: Channel,

    /// Identity used for context lookups
    pub user_id: String,

    /// Address the reply goes back to (phone number or chat id)
    pub reply_to: String,

    pub text: String,
}

/// Something that can deliver a text reply on a channel
#[async_trait]
pub trait ReplySender: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send_reply(&self, recipient: &str, text: &str) -> Result<()>;
}

pub(crate) async fn send_json(channel: &'static str, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    let response = check_status(channel, response).await?;
    Ok(response.json().await?)
}

pub(crate) async fn check_status(channel: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(channel, status = status.as_u16(), "Channel API call failed");
    Err(ChannelError::Api {
        channel,
        status: status.as_u16(),
        body,
    })
}
