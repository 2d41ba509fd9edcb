//! Server Settings
//!
//! Everything is read from environment variables (after `.env` is loaded by
//! `main`). `Settings::from_lookup` takes the lookup function so tests can
//! feed a map instead of the real environment.

use std::str::FromStr;

use relay_core::AgentConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which completion backend to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unknown provider '{}', expected openai or ollama", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
}

#[derive(Clone, Debug)]
pub struct OllamaSettings {
    pub url: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_size: usize,
}

#[derive(Clone, Debug, Default)]
pub struct WhatsAppSettings {
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub api_version: String,
    pub verify_token: Option<String>,
    pub app_secret: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub webhook_secret: Option<String>,
}

/// Complete server configuration
#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_host: String,
    pub port: u16,

    /// `APP_ENV=production` hides internal error details from responses
    pub production: bool,

    pub provider: ProviderKind,
    pub openai: OpenAiSettings,
    pub ollama: OllamaSettings,
    pub qdrant: QdrantSettings,

    /// Persona and sampling; `model` follows the selected provider
    pub agent: AgentConfig,

    /// Value expected in `x-api-key`
    pub service_api_key: Option<String>,

    pub whatsapp: WhatsAppSettings,
    pub telegram: TelegramSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let provider = env.parse("LLM_PROVIDER", ProviderKind::OpenAi)?;

        let openai = OpenAiSettings {
            api_key: env.get("OPENAI_API_KEY"),
            base_url: env.or("OPENAI_BASE_URL", "https://api.openai.com"),
            model: env.or("OPENAI_MODEL", "gpt-4-turbo"),
            embedding_model: env.or("OPENAI_EMBEDDING_MODEL", "text-embedding-ada-002"),
        };

        if provider == ProviderKind::OpenAi && openai.api_key.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }

        let ollama = OllamaSettings {
            url: env.or("OLLAMA_URL", "http://localhost:11434"),
            model: env.or("OLLAMA_MODEL", "llama2"),
        };

        let defaults = AgentConfig::default();
        let agent = AgentConfig {
            name: env.or("AGENT_NAME", &defaults.name),
            description: env.or("AGENT_DESCRIPTION", &defaults.description),
            model: match provider {
                ProviderKind::OpenAi => openai.model.clone(),
                ProviderKind::Ollama => ollama.model.clone(),
            },
            temperature: env.parse("AGENT_TEMPERATURE", defaults.temperature)?,
            use_knowledge_base: env.flag("AGENT_USE_KNOWLEDGE_BASE", defaults.use_knowledge_base)?,
        };

        agent.validate().map_err(|e| ConfigError::Invalid {
            name: "AGENT_*",
            value: format!("{:?}", agent),
            reason: e.to_string(),
        })?;

        Ok(Self {
            bind_host: env.or("BIND_HOST", "0.0.0.0"),
            port: env.parse("PORT", 3000)?,
            production: env
                .get("APP_ENV")
                .is_some_and(|v| v.eq_ignore_ascii_case("production")),
            provider,
            openai,
            ollama,
            qdrant: QdrantSettings {
                url: env.or("QDRANT_URL", "http://localhost:6333"),
                api_key: env.get("QDRANT_API_KEY"),
                collection: env.or("QDRANT_COLLECTION", "customer_data"),
                vector_size: env.parse("QDRANT_VECTOR_SIZE", 1536)?,
            },
            agent,
            service_api_key: env.get("SERVICE_API_KEY"),
            whatsapp: WhatsAppSettings {
                access_token: env.get("WHATSAPP_ACCESS_TOKEN"),
                phone_number_id: env.get("WHATSAPP_PHONE_NUMBER_ID"),
                api_version: env.or("WHATSAPP_API_VERSION", "v18.0"),
                verify_token: env.get("WHATSAPP_VERIFY_TOKEN"),
                app_secret: env.get("WHATSAPP_APP_SECRET"),
            },
            telegram: TelegramSettings {
                bot_token: env.get("TELEGRAM_BOT_TOKEN"),
                webhook_secret: env.get("TELEGRAM_WEBHOOK_SECRET"),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
            Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
            Some(v) => Err(ConfigError::Invalid {
                name: key,
                value: v,
                reason: "expected true or false".into(),
            }),
        }
    }
}
