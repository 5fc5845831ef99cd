use std::sync::OnceLock;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::classify::{ErrorClass, classify};
use crate::error::ProviderError;
use crate::provider::ProviderSet;
use crate::retry::RetryPolicy;
use crate::types::{DEFAULT_SYSTEM_PROMPT, ProviderCall, ProviderChain, ProviderId, ResponseMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed { class: ErrorClass, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub provider: ProviderId,
    pub attempt: u8,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationReport {
    pub attempts: Vec<AttemptRecord>,
    pub backoffs: Vec<Duration>,
    pub answered_by: Option<ProviderId>,
}

impl OrchestrationReport {
    pub fn attempts_for(&self, provider: ProviderId) -> usize {
        self.attempts
            .iter()
            .filter(|record| record.provider == provider)
            .count()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.attempts
            .iter()
            .rev()
            .find_map(|record| match &record.outcome {
                AttemptOutcome::Failed { message, .. } => Some(message.as_str()),
                AttemptOutcome::Succeeded => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orchestration {
    pub text: String,
    pub report: OrchestrationReport,
}

/// Sequential retry-then-failover over the two known providers.
///
/// Providers are never called in parallel. Every outcome, including total
/// failure, comes back as text.
pub struct ProviderOrchestrator {
    providers: ProviderSet,
    policy: RetryPolicy,
}

impl ProviderOrchestrator {
    pub fn new(providers: ProviderSet) -> Self {
        Self {
            providers,
            policy: RetryPolicy::default(),
        }
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn ask(
        &self,
        provider: ProviderId,
        mode: ResponseMode,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> String {
        self.run(provider, mode, system_prompt, prompt).await.text
    }

    /// Like [`Self::ask`], but the whole chain finishes within `budget`.
    pub async fn ask_within(
        &self,
        budget: Duration,
        provider: ProviderId,
        mode: ResponseMode,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> String {
        self.run_within(budget, provider, mode, system_prompt, prompt)
            .await
            .text
    }

    pub async fn run(
        &self,
        provider: ProviderId,
        mode: ResponseMode,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> Orchestration {
        self.run_until(None, provider, mode, system_prompt, prompt)
            .await
    }

    /// Each provider still in the chain gets an equal share of what is left
    /// of `budget`. A request that outlives its share counts as a timeout,
    /// and a backoff that would outlive it abandons the provider.
    pub async fn run_within(
        &self,
        budget: Duration,
        provider: ProviderId,
        mode: ResponseMode,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> Orchestration {
        let deadline = Instant::now() + budget;
        self.run_until(Some(deadline), provider, mode, system_prompt, prompt)
            .await
    }

    async fn run_until(
        &self,
        deadline: Option<Instant>,
        provider: ProviderId,
        mode: ResponseMode,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> Orchestration {
        let mut report = OrchestrationReport::default();
        let prompt = strip_address_prefix(prompt).trim();
        if prompt.is_empty() {
            return Orchestration {
                text: format!("[hookline] empty prompt; nothing sent to {provider}"),
                report,
            };
        }
        let system_prompt = system_prompt
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let chain = ProviderChain::starting_with(provider);
        let chain_len = chain.providers().len();
        for (index, current) in chain.iter().enumerate() {
            let share_deadline = deadline.map(|deadline| {
                let now = Instant::now();
                let left = deadline.saturating_duration_since(now);
                now + left / (chain_len - index) as u32
            });
            let call = ProviderCall {
                provider: current,
                mode,
                system_prompt: system_prompt.to_string(),
                prompt: prompt.to_string(),
            };
            if let Some(text) = self.run_provider(&call, share_deadline, &mut report).await {
                let fallback = index > 0;
                info!(provider = %current, fallback, "provider answered");
                report.answered_by = Some(current);
                return Orchestration {
                    text: format!("[{current}] {text}"),
                    report,
                };
            }
            if index + 1 < chain_len {
                warn!(
                    provider = %current,
                    next = %chain.providers()[index + 1],
                    "provider abandoned, trying next in chain"
                );
            }
        }

        let last_error = report.last_error().unwrap_or("no attempt was made");
        warn!(chain = %chain, last_error, "all providers failed");
        let text = format!("[hookline] all providers failed ({chain}); last error: {last_error}");
        Orchestration { text, report }
    }

    /// Bounded retry against a single provider. `None` means abandon it.
    async fn run_provider(
        &self,
        call: &ProviderCall,
        deadline: Option<Instant>,
        report: &mut OrchestrationReport,
    ) -> Option<String> {
        let client = self.providers.client(call.provider);
        let mut state = self.policy.start();

        loop {
            let attempt = state.attempt();
            let result = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        debug!(provider = %call.provider, attempt, "no time budget left");
                        return None;
                    }
                    timeout(left, client.call(call))
                        .await
                        .unwrap_or_else(|_| {
                            Err(ProviderError::TimedOut {
                                provider: call.provider,
                                elapsed_ms: left.as_millis() as u64,
                            })
                        })
                }
                None => client.call(call).await,
            };
            match result {
                Ok(text) => {
                    report.attempts.push(AttemptRecord {
                        provider: call.provider,
                        attempt,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return Some(text);
                }
                Err(error) => {
                    let message = error.to_string();
                    let class = classify(&message);
                    warn!(
                        provider = %call.provider,
                        attempt,
                        max_attempts = state.max_attempts(),
                        class = ?class,
                        error = %message,
                        "provider call failed"
                    );
                    report.attempts.push(AttemptRecord {
                        provider: call.provider,
                        attempt,
                        outcome: AttemptOutcome::Failed { class, message },
                    });

                    match class {
                        ErrorClass::Retryable if state.can_retry() => {
                            let delay = state.backoff();
                            if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline)
                            {
                                debug!(
                                    provider = %call.provider,
                                    attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    "backoff would outlive the time budget"
                                );
                                return None;
                            }
                            debug!(
                                provider = %call.provider,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "backing off before retry"
                            );
                            report.backoffs.push(delay);
                            sleep(delay).await;
                            state.advance();
                        }
                        ErrorClass::Retryable | ErrorClass::SkipToFallback | ErrorClass::Fail => {
                            return None;
                        }
                    }
                }
            }
        }
    }
}

fn address_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        let names = ProviderId::ALL
            .iter()
            .map(|provider| provider.as_str())
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"^\s*(?:@(?:{names})\b|(?:ask|consult)\s+(?:{names})\b(?:\s+to\b)?|(?:{names})\s*:)[\s:,]*"
        );
        RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("address prefix pattern is a valid regex")
    })
}

/// Removes one leading provider address such as `@codex`, `gemini:` or
/// `ask codex to`.
pub fn strip_address_prefix(prompt: &str) -> &str {
    match address_prefix().find(prompt) {
        Some(found) => &prompt[found.end()..],
        None => prompt,
    }
}
