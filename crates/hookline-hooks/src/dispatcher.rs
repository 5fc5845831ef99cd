use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use hookline_ai::ProviderOrchestrator;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::ScriptError;
use crate::keywords::{KeywordRegistry, KeywordResolution};
use crate::payload::HookPayload;
use crate::rules::{Action, Rule};
use crate::script::run_script;
use crate::state::StateStore;

pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

// Provider consultation has to return its text before the action timeout.
const PROVIDER_BUDGET_PERCENT: u32 = 90;

/// Routes one prompt through the rule table and runs every matching action
/// concurrently.
///
/// Dispatch never fails: malformed payloads, failing scripts and timeouts all
/// collapse to missing output, so the host session is never blocked by a
/// hook.
pub struct Dispatcher {
    rules: Vec<Rule>,
    keywords: KeywordRegistry,
    orchestrator: Option<ProviderOrchestrator>,
    action_timeout: Duration,
    state_fallback_dir: Option<PathBuf>,
    track_state: bool,
}

impl Dispatcher {
    pub fn new(rules: Vec<Rule>, keywords: KeywordRegistry) -> Self {
        Self {
            rules,
            keywords,
            orchestrator: None,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            state_fallback_dir: None,
            track_state: true,
        }
    }

    pub fn orchestrator(mut self, orchestrator: ProviderOrchestrator) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn action_timeout(mut self, action_timeout: Duration) -> Self {
        self.action_timeout = action_timeout;
        self
    }

    /// Where session state goes when the payload carries no `cwd`.
    pub fn state_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_fallback_dir = Some(dir.into());
        self
    }

    pub fn track_state(mut self, track_state: bool) -> Self {
        self.track_state = track_state;
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn keywords(&self) -> &KeywordRegistry {
        &self.keywords
    }

    pub fn matching_rules(&self, prompt: &str) -> Vec<&Rule> {
        self.rules.iter().filter(|rule| rule.matches(prompt)).collect()
    }

    /// Parses `raw` as a hook payload and dispatches it. Anything that is not
    /// a usable payload yields empty output.
    pub async fn dispatch_raw(&self, raw: &str) -> String {
        match HookPayload::parse(raw) {
            Ok(payload) => self.dispatch(&payload).await,
            Err(error) => {
                debug!(error = %error, "ignoring malformed hook payload");
                String::new()
            }
        }
    }

    pub async fn dispatch(&self, payload: &HookPayload) -> String {
        let matched = self.matching_rules(&payload.prompt);
        if matched.is_empty() {
            debug!("no hook rule matched");
            return String::new();
        }
        debug!(
            rules = ?matched.iter().map(|rule| rule.label.as_str()).collect::<Vec<_>>(),
            "dispatching matched rules"
        );

        let payload_json = payload.to_json();
        let outputs = join_all(
            matched
                .into_iter()
                .map(|rule| self.run_rule(rule, payload, &payload_json)),
        )
        .await;

        outputs
            .into_iter()
            .flatten()
            .map(|output| output.trim().to_string())
            .filter(|output| !output.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Keyword resolution alone, without touching session state.
    pub fn resolve_keywords(&self, payload: &HookPayload) -> String {
        self.keywords.resolve(&payload.prompt).text
    }

    async fn run_rule(
        &self,
        rule: &Rule,
        payload: &HookPayload,
        payload_json: &str,
    ) -> Option<String> {
        let action = self.run_action(&rule.action, payload, payload_json);
        match timeout(self.action_timeout, action).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                warn!(label = %rule.label, error = %error, "hook action failed");
                None
            }
            Err(_) => {
                warn!(
                    label = %rule.label,
                    timeout_ms = self.action_timeout.as_millis() as u64,
                    "hook action timed out"
                );
                None
            }
        }
    }

    async fn run_action(
        &self,
        action: &Action,
        payload: &HookPayload,
        payload_json: &str,
    ) -> Result<Option<String>, ScriptError> {
        match action {
            Action::InvokeExternalScript { path, args } => {
                run_script(path, args, payload.cwd.as_deref(), payload_json)
                    .await
                    .map(Some)
            }
            Action::EmitLiteralText(text) => Ok(Some(text.clone())),
            Action::ResolveKeywords => Ok(self.run_keywords(payload).await),
            Action::AskProvider { provider, mode } => match &self.orchestrator {
                Some(orchestrator) => Ok(Some(
                    orchestrator
                        .ask_within(
                            self.provider_budget(),
                            *provider,
                            *mode,
                            None,
                            &payload.prompt,
                        )
                        .await,
                )),
                None => {
                    debug!(provider = %provider, "no provider orchestrator configured");
                    Ok(None)
                }
            },
            Action::Skip => Ok(None),
        }
    }

    fn provider_budget(&self) -> Duration {
        self.action_timeout * PROVIDER_BUDGET_PERCENT / 100
    }

    async fn run_keywords(&self, payload: &HookPayload) -> Option<String> {
        let resolution = self.keywords.resolve(&payload.prompt);
        if resolution.is_empty() {
            return None;
        }
        info!(
            keywords = ?resolution.keywords,
            synergies = resolution.synergies.len(),
            "magic keywords detected"
        );
        if self.track_state && resolution.mode.is_some() {
            self.record_state(payload, &resolution).await;
        }
        Some(resolution.text)
    }

    /// The file write runs on the blocking pool so sibling actions keep
    /// making progress.
    async fn record_state(&self, payload: &HookPayload, resolution: &KeywordResolution) {
        let store = match (&payload.cwd, &self.state_fallback_dir) {
            (Some(cwd), _) => StateStore::for_workspace(cwd),
            (None, Some(dir)) => StateStore::in_dir(dir),
            (None, None) => return,
        };
        let path = store.path().to_path_buf();
        let mode = resolution.mode.clone();
        let keywords = resolution.keywords.clone();
        let session_id = payload.session_id.clone();
        let task = spawn_blocking(move || {
            store.update(|state| {
                state.mode = mode;
                state.keywords = keywords;
                if session_id.is_some() {
                    state.session_id = session_id;
                }
            })
        });
        match task.await {
            Ok(Ok(state)) => debug!(
                path = %path.display(),
                mode = ?state.mode,
                "session state updated"
            ),
            Ok(Err(error)) => warn!(error = %error, "failed to update session state"),
            Err(error) => warn!(error = %error, "session state task failed"),
        }
    }
}
