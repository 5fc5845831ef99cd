//! Provider plumbing for hookline: error classification, bounded retry and
//! ordered failover between the two known LLM providers.

mod classify;
mod error;
mod orchestrator;
mod provider;
mod providers;
mod retry;
mod types;

pub use classify::{ErrorClass, classify};
pub use error::ProviderError;
pub use orchestrator::{
    AttemptOutcome, AttemptRecord, Orchestration, OrchestrationReport, ProviderOrchestrator,
    strip_address_prefix,
};
pub use provider::{ProviderClient, ProviderClientRef, ProviderSet, ProviderSettings};
pub use providers::{GeminiClient, OpenAiChatClient};
pub use retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy, RetryState, backoff_delay,
};
pub use types::{DEFAULT_SYSTEM_PROMPT, ProviderCall, ProviderChain, ProviderId, ResponseMode};
