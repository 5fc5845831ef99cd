use thiserror::Error;

use crate::ProviderId;

/// Failure of a single provider call.
///
/// The `Display` text is what [`crate::classify`] inspects, so HTTP failures
/// always carry their numeric status and transport failures always say
/// "network error".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{provider} API key missing: set {env_var} or providers.{provider}.api_key")]
    AuthMissing {
        provider: ProviderId,
        env_var: String,
    },

    #[error("{provider} HTTP {status}: {body}")]
    Http {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    #[error("{provider} network error: {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },

    #[error("{provider} request timed out after {elapsed_ms}ms")]
    TimedOut { provider: ProviderId, elapsed_ms: u64 },

    #[error("{provider} protocol error: {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },

    #[error("{provider} returned invalid JSON: {message}")]
    InvalidJson {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::AuthMissing { provider, .. }
            | Self::Http { provider, .. }
            | Self::Transport { provider, .. }
            | Self::TimedOut { provider, .. }
            | Self::Protocol { provider, .. }
            | Self::InvalidJson { provider, .. } => *provider,
        }
    }

    pub(crate) fn protocol(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider,
            message: message.into(),
        }
    }
}
