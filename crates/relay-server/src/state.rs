//! Application State

use std::sync::Arc;

use relay_channels::ReplySender;
use relay_core::{Agent, DocumentStore};

/// WhatsApp webhook wiring
#[derive(Clone, Default)]
pub struct WhatsAppChannel {
    /// Token Meta echoes during subscription verification
    pub verify_token: Option<String>,

    /// Enables `X-Hub-Signature-256` checks when set
    pub app_secret: Option<String>,

    /// Replies are only logged when absent
    pub sender: Option<Arc<dyn ReplySender>>,
}

/// Telegram webhook wiring
#[derive(Clone, Default)]
pub struct TelegramChannel {
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, when set
    pub webhook_secret: Option<String>,

    pub sender: Option<Arc<dyn ReplySender>>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator every route funnels into
    pub agent: Arc<Agent>,

    /// Present when the knowledge base is enabled
    pub knowledge: Option<Arc<dyn DocumentStore>>,

    /// Value required in `x-api-key`; every request is refused when unset
    pub service_api_key: Option<Arc<str>>,

    /// Error bodies carry a `message` with the internal cause when set.
    /// Off unless turned on, and always off in production.
    pub expose_error_details: bool,

    pub whatsapp: WhatsAppChannel,
    pub telegram: TelegramChannel,
}

impl AppState {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            knowledge: None,
            service_api_key: None,
            expose_error_details: false,
            whatsapp: WhatsAppChannel::default(),
            telegram: TelegramChannel::default(),
        }
    }

    pub fn with_service_api_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.service_api_key = Some(key.into());
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn DocumentStore>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    pub fn with_whatsapp(mut self, whatsapp: WhatsAppChannel) -> Self {
        self.whatsapp = whatsapp;
        self
    }

    pub fn with_telegram(mut self, telegram: TelegramChannel) -> Self {
        self.telegram = telegram;
        self
    }
}
