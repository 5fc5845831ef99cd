use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::providers::{GeminiClient, OpenAiChatClient};
use crate::types::{ProviderCall, ProviderId};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// One call against one provider, no retries.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn call(&self, call: &ProviderCall) -> Result<String, ProviderError>;
}

pub type ProviderClientRef = Arc<dyn ProviderClient>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub request_timeout: Duration,
}

impl ProviderSettings {
    pub fn defaults(provider: ProviderId) -> Self {
        let (base_url, model) = match provider {
            ProviderId::Codex => ("https://api.openai.com/v1", "gpt-4.1"),
            ProviderId::Gemini => (
                "https://generativelanguage.googleapis.com/v1beta",
                "gemini-2.5-pro",
            ),
        };
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: None,
            api_key_env: provider.api_key_env().to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Inline key first, then the configured environment variable.
    pub(crate) fn resolve_api_key(&self, provider: ProviderId) -> Result<String, ProviderError> {
        if let Some(api_key) = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Ok(api_key.to_string());
        }

        if let Ok(value) = std::env::var(&self.api_key_env) {
            if !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }

        Err(ProviderError::AuthMissing {
            provider,
            env_var: self.api_key_env.clone(),
        })
    }
}

/// Exactly one client per known provider, selected by exhaustive match.
#[derive(Clone)]
pub struct ProviderSet {
    codex: ProviderClientRef,
    gemini: ProviderClientRef,
}

impl ProviderSet {
    pub fn new(codex: ProviderClientRef, gemini: ProviderClientRef) -> Self {
        Self { codex, gemini }
    }

    pub fn http(codex: ProviderSettings, gemini: ProviderSettings) -> Self {
        Self::new(
            Arc::new(OpenAiChatClient::new(codex)),
            Arc::new(GeminiClient::new(gemini)),
        )
    }

    pub fn client(&self, provider: ProviderId) -> &ProviderClientRef {
        match provider {
            ProviderId::Codex => &self.codex,
            ProviderId::Gemini => &self.gemini,
        }
    }
}
