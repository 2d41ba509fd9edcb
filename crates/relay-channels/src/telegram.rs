//! Telegram Bot API Integration

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::channel::{Channel, InboundText, ReplySender, send_json};
use crate::error::{ChannelError, Result};

const CHANNEL: &str = "Telegram";

/// Incoming webhook update
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,

    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TelegramMessage {
    #[serde(default)]
    pub message_id: Option<i64>,

    pub from: User,

    #[serde(default)]
    pub chat: Option<Chat>,

    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,

    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Parse a raw update. Updates without a `message` are rejected.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let update: Self = serde_json::from_slice(body)?;
        if update.message.is_none() {
            return Err(ChannelError::InvalidPayload("message is missing".into()));
        }
        Ok(update)
    }

    /// The text carried by this update, if any. Replies go to the chat, or
    /// to the sender when the chat is absent.
    pub fn text_message(&self) -> Option<InboundText> {
        let message = self.message.as_ref()?;
        let text = message.text.as_ref()?;
        let reply_to = message.chat.as_ref().map_or(message.from.id, |c| c.id);

        Some(InboundText {
            channel: Channel::Telegram,
            user_id: format!("telegram-{}", message.from.id),
            reply_to: reply_to.to_string(),
            text: text.clone(),
        })
    }
}

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        Self::with_api_url("https://api.telegram.org", bot_token)
    }

    pub fn with_api_url(api_url: impl Into<String>, bot_token: impl Into<String>) -> Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.is_empty() {
            return Err(ChannelError::Config("Telegram bot token is required".into()));
        }
        Ok(Self {
            client: Client::new(),
            api_url: api_url.into(),
            bot_token,
        })
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<Value> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        );
        let body = send_json(
            CHANNEL,
            self.client
                .post(url)
                .json(&json!({ "chat_id": chat_id, "text": text })),
        )
        .await?;

        if body["ok"].as_bool() == Some(false) {
            return Err(ChannelError::Api {
                channel: CHANNEL,
                status: 200,
                body: body.to_string(),
            });
        }

        tracing::info!(chat_id, "Telegram message sent");
        Ok(body)
    }
}

#[async_trait]
impl ReplySender for TelegramClient {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send_reply(&self, recipient: &str, text: &str) -> Result<()> {
        self.send_message(recipient, text).await.map(|_| ())
    }
}
