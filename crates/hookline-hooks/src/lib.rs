//! Prompt-hook runtime: routes one user prompt to the matching actions, runs
//! them concurrently and aggregates their output for the host session.

pub mod config;
mod dispatcher;
mod error;
pub mod keywords;
pub mod logging;
mod payload;
mod rules;
mod script;
mod state;

pub use config::{CONFIG_FILE_NAME, HooklineConfig, load_config, resolve_conf_dir};
pub use dispatcher::{DEFAULT_ACTION_TIMEOUT, Dispatcher};
pub use error::{ConfigError, PayloadError, ScriptError, StateError};
pub use keywords::{
    KeywordEntry, KeywordRegistry, KeywordRegistryBuilder, KeywordResolution, SynergyEntry,
};
pub use payload::HookPayload;
pub use rules::{Action, ActionSpec, CompiledPattern, Rule, RuleSpec, builtin_rules};
pub use state::{SessionState, StateStore};
