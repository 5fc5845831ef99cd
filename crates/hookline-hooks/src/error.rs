use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {} failed: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("parse {} failed: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("rule '{label}' has an invalid pattern: {source}")]
    InvalidPattern { label: String, source: regex::Error },

    #[error("rule '{label}': {message}")]
    InvalidRule { label: String, message: String },

    #[error("keyword '{name}': {message}")]
    InvalidKeyword { name: String, message: String },
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is empty")]
    Empty,

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no prompt")]
    MissingPrompt,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("spawn {} failed: {source}", program.display())]
    Spawn { program: PathBuf, source: io::Error },

    #[error("{} io failed: {source}", program.display())]
    Io { program: PathBuf, source: io::Error },

    #[error("{} exited with {status}: {stderr}", program.display())]
    Exit {
        program: PathBuf,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("state file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
