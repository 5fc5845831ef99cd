use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a senior software engineer consulted by another coding assistant. Answer the request directly and concisely. Prefer concrete code, file paths and commands over general advice, and say so plainly when you are unsure.";

/// The closed set of providers hookline can consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Codex,
    Gemini,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::Codex, ProviderId::Gemini];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }

    /// The provider used as fallback when `self` is the requested one.
    pub fn other(self) -> Self {
        match self {
            Self::Codex => Self::Gemini,
            Self::Gemini => Self::Codex,
        }
    }

    /// Default environment variable holding the provider's API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Codex => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "codex" | "openai" | "gpt" => Ok(Self::Codex),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(format!(
                "unknown provider '{other}' (expected one of: codex, gemini)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Plain,
    #[serde(alias = "json", alias = "json-strict")]
    JsonStrict,
}

impl Display for ResponseMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            Self::JsonStrict => f.write_str("json"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" | "json-strict" | "json_strict" | "strict" => Ok(Self::JsonStrict),
            other => Err(format!("unknown mode '{other}' (expected plain or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub provider: ProviderId,
    pub mode: ResponseMode,
    pub system_prompt: String,
    pub prompt: String,
}

/// Requested provider first, the other known provider second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderChain([ProviderId; 2]);

impl ProviderChain {
    pub fn starting_with(primary: ProviderId) -> Self {
        Self([primary, primary.other()])
    }

    pub fn providers(&self) -> &[ProviderId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.0.iter().copied()
    }
}

impl Display for ProviderChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.0[0], self.0[1])
    }
}
