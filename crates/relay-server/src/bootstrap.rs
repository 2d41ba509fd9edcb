//! Wiring from `Settings` to a ready `AppState`

use std::sync::Arc;

use anyhow::Context;
use relay_channels::{ReplySender, TelegramClient, WhatsAppClient, WhatsAppConfig};
use relay_core::{Agent, DocumentStore, LlmProvider, tool::default_tools};
use relay_runtime::{
    Embedder, OllamaConfig, OllamaProvider, OpenAiConfig, OpenAiProvider, QdrantConfig,
    QdrantKnowledgeBase,
};

use crate::config::{ProviderKind, Settings};
use crate::state::{AppState, TelegramChannel, WhatsAppChannel};

fn openai(settings: &Settings) -> relay_core::Result<Option<Arc<OpenAiProvider>>> {
    let Some(api_key) = settings.openai.api_key.clone() else {
        return Ok(None);
    };
    let provider = OpenAiProvider::new(OpenAiConfig {
        base_url: settings.openai.base_url.clone(),
        api_key,
        embedding_model: settings.openai.embedding_model.clone(),
        ..Default::default()
    })?;
    Ok(Some(Arc::new(provider)))
}

/// Completion backend plus the embedder for the knowledge base. Embeddings
/// come from OpenAI whenever a key is available, so vector sizes stay stable
/// across provider switches.
pub fn build_provider(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn LlmProvider>, Arc<dyn Embedder>)> {
    let openai = openai(settings).context("Failed to create OpenAI client")?;

    match settings.provider {
        ProviderKind::OpenAi => {
            let openai = openai.context("OPENAI_API_KEY is required for the openai provider")?;
            let provider: Arc<dyn LlmProvider> = openai.clone();
            let embedder: Arc<dyn Embedder> = openai;
            Ok((provider, embedder))
        }
        ProviderKind::Ollama => {
            let ollama = Arc::new(
                OllamaProvider::from_config(OllamaConfig {
                    base_url: settings.ollama.url.clone(),
                    embedding_model: settings.ollama.model.clone(),
                    ..Default::default()
                })
                .context("Failed to create Ollama client")?,
            );
            let embedder: Arc<dyn Embedder> = match openai {
                Some(openai) => openai,
                None => ollama.clone(),
            };
            let provider: Arc<dyn LlmProvider> = ollama;
            Ok((provider, embedder))
        }
    }
}

fn whatsapp_sender(settings: &Settings) -> anyhow::Result<Option<Arc<dyn ReplySender>>> {
    let whatsapp = &settings.whatsapp;
    let (Some(token), Some(phone_number_id)) = (&whatsapp.access_token, &whatsapp.phone_number_id)
    else {
        return Ok(None);
    };

    let client = WhatsAppClient::new(WhatsAppConfig {
        api_version: whatsapp.api_version.clone(),
        ..WhatsAppConfig::new(token.clone(), phone_number_id.clone())
    })?;
    let sender: Arc<dyn ReplySender> = Arc::new(client);
    Ok(Some(sender))
}

fn telegram_sender(settings: &Settings) -> anyhow::Result<Option<Arc<dyn ReplySender>>> {
    let Some(token) = &settings.telegram.bot_token else {
        return Ok(None);
    };
    let sender: Arc<dyn ReplySender> = Arc::new(TelegramClient::new(token.clone())?);
    Ok(Some(sender))
}

/// Everything `main` needs before serving
pub struct Services {
    pub state: AppState,

    /// Concrete handle for startup checks; the state only sees the trait
    pub knowledge_base: Option<Arc<QdrantKnowledgeBase>>,
}

/// Build the shared state. No network calls happen here.
pub fn build_services(settings: &Settings) -> anyhow::Result<Services> {
    let (provider, embedder) = build_provider(settings)?;

    let knowledge = if settings.agent.use_knowledge_base {
        let kb = QdrantKnowledgeBase::new(
            QdrantConfig {
                url: settings.qdrant.url.clone(),
                api_key: settings.qdrant.api_key.clone(),
                collection: settings.qdrant.collection.clone(),
                vector_size: settings.qdrant.vector_size,
                ..Default::default()
            },
            embedder,
        )
        .context("Failed to create Qdrant client")?;
        Some(Arc::new(kb))
    } else {
        None
    };

    let mut builder = Agent::builder()
        .provider(provider)
        .config(settings.agent.clone())
        .tools(default_tools());
    if let Some(kb) = &knowledge {
        builder = builder.retriever(kb.clone());
    }
    let agent = builder.build().context("Invalid agent configuration")?;

    let mut state = AppState::new(Arc::new(agent))
        .with_whatsapp(WhatsAppChannel {
            verify_token: settings.whatsapp.verify_token.clone(),
            app_secret: settings.whatsapp.app_secret.clone(),
            sender: whatsapp_sender(settings)?,
        })
        .with_telegram(TelegramChannel {
            webhook_secret: settings.telegram.webhook_secret.clone(),
            sender: telegram_sender(settings)?,
        })
        .with_error_details(!settings.production);

    if let Some(key) = settings.service_api_key.as_deref() {
        state = state.with_service_api_key(key);
    }
    if let Some(kb) = &knowledge {
        let store: Arc<dyn DocumentStore> = kb.clone();
        state = state.with_knowledge(store);
    }

    Ok(Services {
        state,
        knowledge_base: knowledge,
    })
}
