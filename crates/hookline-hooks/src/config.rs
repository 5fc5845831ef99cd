use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hookline_ai::{ProviderId, ProviderOrchestrator, ProviderSet, ProviderSettings, RetryPolicy};
use serde::Deserialize;

use crate::dispatcher::{DEFAULT_ACTION_TIMEOUT, Dispatcher};
use crate::error::ConfigError;
use crate::keywords::{KeywordEntry, KeywordRegistry, KeywordRegistryBuilder, SynergyEntry};
use crate::logging::{DEFAULT_LOG_LEVEL, DEFAULT_ROTATE_SIZE_MB, LogConfig};
use crate::rules::{Rule, RuleSpec, builtin_rules};

pub const CONF_DIR_ENV: &str = "HOOKLINE_CONF_DIR";
pub const CONFIG_FILE_NAME: &str = "hookline.toml";
const DEFAULT_CONF_DIR_NAME: &str = ".hookline";
const LOG_DIR_NAME: &str = "logs";

/// `--conf-dir` wins, then `$HOOKLINE_CONF_DIR`, then `~/.hookline`.
pub fn resolve_conf_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return expand_path_with_home(path);
    }
    if let Some(value) = std::env::var_os(CONF_DIR_ENV).filter(|value| !value.is_empty()) {
        return expand_path_with_home(Path::new(&value));
    }
    home_dir().join(DEFAULT_CONF_DIR_NAME)
}

/// Reads `<conf_dir>/hookline.toml`. A missing file is the default config.
pub fn load_config(conf_dir: &Path) -> Result<HooklineConfig, ConfigError> {
    let path = conf_dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(HooklineConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    HooklineConfig::from_toml(&content).map_err(|source| ConfigError::Toml { path, source })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HooklineConfig {
    #[serde(default)]
    pub log: LogSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub keywords: Vec<KeywordEntry>,
    #[serde(default)]
    pub synergies: Vec<SynergyEntry>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub rotate_size_mb: Option<u64>,
    #[serde(default)]
    pub stderr: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DispatchSection {
    #[serde(default)]
    pub action_timeout_ms: Option<u64>,
    #[serde(default)]
    pub builtin_rules: Option<bool>,
    #[serde(default)]
    pub track_state: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RetrySection {
    #[serde(default)]
    pub max_attempts: Option<u8>,
    #[serde(default)]
    pub base_delay_ms: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProvidersSection {
    #[serde(default)]
    pub codex: ProviderSection,
    #[serde(default)]
    pub gemini: ProviderSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl HooklineConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Built-in rules (unless disabled) followed by the configured ones.
    pub fn rules(&self) -> Result<Vec<Rule>, ConfigError> {
        let mut rules = if self.dispatch.builtin_rules.unwrap_or(true) {
            builtin_rules()?
        } else {
            Vec::new()
        };
        for spec in &self.rules {
            rules.push(spec.compile()?);
        }
        Ok(rules)
    }

    pub fn keyword_registry(&self) -> Result<KeywordRegistry, ConfigError> {
        let builder = self
            .keywords
            .iter()
            .cloned()
            .fold(KeywordRegistryBuilder::with_builtins(), |builder, entry| {
                builder.keyword(entry)
            });
        self.synergies
            .iter()
            .cloned()
            .fold(builder, |builder, entry| builder.synergy(entry))
            .build()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(max_attempts) = self.retry.max_attempts {
            policy = policy.max_attempts(max_attempts);
        }
        if let Some(base_delay_ms) = self.retry.base_delay_ms {
            policy = policy.base_delay_ms(base_delay_ms);
        }
        policy
    }

    pub fn provider_settings(&self, provider: ProviderId) -> ProviderSettings {
        let section = match provider {
            ProviderId::Codex => &self.providers.codex,
            ProviderId::Gemini => &self.providers.gemini,
        };
        let mut settings = ProviderSettings::defaults(provider);
        if let Some(base_url) = self.resolve_value(section.base_url.as_deref()) {
            settings.base_url = base_url;
        }
        if let Some(model) = self.resolve_value(section.model.as_deref()) {
            settings.model = model;
        }
        settings.api_key = self.resolve_value(section.api_key.as_deref());
        if let Some(api_key_env) = section
            .api_key_env
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            settings.api_key_env = api_key_env.to_string();
        }
        if let Some(timeout_ms) = section.request_timeout_ms.filter(|value| *value > 0) {
            settings.request_timeout = Duration::from_millis(timeout_ms);
        }
        settings
    }

    pub fn orchestrator(&self) -> ProviderOrchestrator {
        let providers = ProviderSet::http(
            self.provider_settings(ProviderId::Codex),
            self.provider_settings(ProviderId::Gemini),
        );
        ProviderOrchestrator::new(providers).retry_policy(self.retry_policy())
    }

    pub fn action_timeout(&self) -> Duration {
        self.dispatch
            .action_timeout_ms
            .filter(|value| *value > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_ACTION_TIMEOUT)
    }

    pub fn log_config(&self, conf_dir: &Path) -> LogConfig {
        let log_dir = self
            .resolve_value(self.log.path.as_deref())
            .map(|value| expand_path_with_home(Path::new(&value)))
            .unwrap_or_else(|| conf_dir.join(LOG_DIR_NAME));
        let mut config = LogConfig::in_dir(log_dir);
        config.level = self
            .resolve_value(self.log.level.as_deref())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        config.rotate_size_bytes = self
            .log
            .rotate_size_mb
            .unwrap_or(DEFAULT_ROTATE_SIZE_MB)
            .max(1)
            * 1024
            * 1024;
        config.stderr = self.log.stderr.unwrap_or(false);
        config
    }

    /// The fully wired dispatcher; session state falls back to `conf_dir`.
    pub fn dispatcher(&self, conf_dir: &Path) -> Result<Dispatcher, ConfigError> {
        Ok(Dispatcher::new(self.rules()?, self.keyword_registry()?)
            .orchestrator(self.orchestrator())
            .action_timeout(self.action_timeout())
            .state_fallback_dir(conf_dir)
            .track_state(self.dispatch.track_state.unwrap_or(true)))
    }

    fn resolve_value(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|value| resolve_config_value(value, &self.env))
    }
}

/// `$NAME` resolves through `[env]` first, then the process environment.
fn resolve_config_value(value: &str, env_map: &HashMap<String, String>) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(env_key) = trimmed.strip_prefix('$') {
        return env_map
            .get(env_key)
            .cloned()
            .or_else(|| std::env::var(env_key).ok())
            .map(|resolved| resolved.trim().to_string())
            .filter(|resolved| !resolved.is_empty());
    }
    Some(trimmed.to_string())
}

fn expand_path_with_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" {
        return home_dir();
    }
    if let Some(suffix) = raw.strip_prefix("~/") {
        return home_dir().join(suffix);
    }
    path.to_path_buf()
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
