//! # relay-channels
//!
//! Messaging channels that feed the relay orchestrator.
//!
//! ```text
//! ┌──────────────┐  webhook   ┌──────────────┐  InboundText  ┌──────────────┐
//! │  WhatsApp /  │──────────▶│    parse +    │─────────────▶│ Orchestrator │
//! │  Telegram    │           │    verify     │              └──────┬───────┘
//! └──────▲───────┘           └──────────────┘                     │ reply
//!        │                                                        ▼
//!        └──────────────────────── ReplySender ◀──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_channels::{WebhookPayload, WhatsAppClient, WhatsAppConfig, ReplySender};
//!
//! let payload = WebhookPayload::parse(&body)?;
//! let client = WhatsAppClient::new(WhatsAppConfig::new(token, phone_number_id))?;
//! for inbound in payload.text_messages() {
//!     let reply = agent.process_message(&inbound.user_id, &inbound.text).await?;
//!     client.send_reply(&inbound.reply_to, &reply).await?;
//! }
//! ```

mod channel;
mod error;
pub mod signature;
pub mod telegram;
pub mod whatsapp;

pub use channel::{Channel, InboundText, ReplySender};
pub use error::{ChannelError, Result};
pub use signature::{hub_signature, verify_hub_signature, verify_secret_token};
pub use telegram::{TelegramClient, Update};
pub use whatsapp::{WebhookPayload, WhatsAppClient, WhatsAppConfig, verify_subscription};
