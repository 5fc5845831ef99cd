use std::path::PathBuf;

use hookline_ai::{ProviderId, ResponseMode};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A case-insensitive regular expression tested against the whole prompt.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
}

impl CompiledPattern {
    pub fn new(label: &str, source: &str) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                label: label.to_string(),
                source,
            })?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InvokeExternalScript { path: PathBuf, args: Vec<String> },
    EmitLiteralText(String),
    ResolveKeywords,
    AskProvider {
        provider: ProviderId,
        mode: ResponseMode,
    },
    /// Structurally present but inert.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub pattern: Option<CompiledPattern>,
    pub action: Action,
    pub label: String,
}

impl Rule {
    pub fn always(label: impl Into<String>, action: Action) -> Self {
        Self {
            pattern: None,
            action,
            label: label.into(),
        }
    }

    pub fn when(
        label: impl Into<String>,
        pattern: &str,
        action: Action,
    ) -> Result<Self, ConfigError> {
        let label = label.into();
        let pattern = CompiledPattern::new(&label, pattern)?;
        Ok(Self {
            pattern: Some(pattern),
            action,
            label,
        })
    }

    pub fn matches(&self, input: &str) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|pattern| pattern.is_match(input))
    }
}

/// The rules installed unless `dispatch.builtin_rules = false`.
pub fn builtin_rules() -> Result<Vec<Rule>, ConfigError> {
    Ok(vec![
        Rule::always("magic-keywords", Action::ResolveKeywords),
        Rule::when(
            "ask-codex",
            r"\b(?:ask|consult)\s+codex\b|@codex\b",
            Action::AskProvider {
                provider: ProviderId::Codex,
                mode: ResponseMode::Plain,
            },
        )?,
        Rule::when(
            "ask-gemini",
            r"\b(?:ask|consult)\s+gemini\b|@gemini\b",
            Action::AskProvider {
                provider: ProviderId::Gemini,
                mode: ResponseMode::Plain,
            },
        )?,
    ])
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
    Script {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Text {
        text: String,
    },
    Keywords,
    Ask {
        provider: ProviderId,
        #[serde(default)]
        mode: ResponseMode,
    },
    Skip,
}

impl ActionSpec {
    fn compile(&self, label: &str) -> Result<Action, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidRule {
            label: label.to_string(),
            message: message.to_string(),
        };
        match self {
            Self::Script { command, args } => {
                let mut parts = shlex::split(command)
                    .ok_or_else(|| invalid("script command has unbalanced quotes"))?
                    .into_iter();
                let program = parts
                    .next()
                    .filter(|program| !program.trim().is_empty())
                    .ok_or_else(|| invalid("script command cannot be empty"))?;
                let mut all_args = parts.collect::<Vec<_>>();
                all_args.extend(args.iter().cloned());
                Ok(Action::InvokeExternalScript {
                    path: PathBuf::from(program),
                    args: all_args,
                })
            }
            Self::Text { text } => {
                if text.trim().is_empty() {
                    return Err(invalid("text action cannot be empty"));
                }
                Ok(Action::EmitLiteralText(text.clone()))
            }
            Self::Keywords => Ok(Action::ResolveKeywords),
            Self::Ask { provider, mode } => Ok(Action::AskProvider {
                provider: *provider,
                mode: *mode,
            }),
            Self::Skip => Ok(Action::Skip),
        }
    }
}

/// A rule as written in `hookline.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub pattern: Option<String>,
    pub action: ActionSpec,
}

impl RuleSpec {
    pub fn compile(&self) -> Result<Rule, ConfigError> {
        let label = if self.label.trim().is_empty() {
            "unnamed-rule".to_string()
        } else {
            self.label.trim().to_string()
        };
        let action = self.action.compile(&label)?;
        match self
            .pattern
            .as_deref()
            .filter(|pattern| !pattern.trim().is_empty())
        {
            Some(pattern) => Rule::when(label, pattern, action),
            None => Ok(Rule::always(label, action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_without_pattern_always_matches() {
        let rule = Rule::always("banner", Action::EmitLiteralText("hi".to_string()));
        assert!(rule.matches(""));
        assert!(rule.matches("anything at all"));
    }

    #[test]
    fn patterns_are_case_insensitive() {
        let rule = Rule::when("tests", r"\bunit tests?\b", Action::Skip).expect("valid rule");
        assert!(rule.matches("please add UNIT TESTS here"));
        assert!(!rule.matches("unittest"));
    }

    #[test]
    fn invalid_pattern_names_the_rule() {
        let error = Rule::when("broken", "(unclosed", Action::Skip).expect_err("bad regex");
        assert!(error.to_string().contains("broken"));
    }

    #[test]
    fn builtin_rules_compile_and_route_provider_mentions() {
        let rules = builtin_rules().expect("builtin rules compile");
        let fired = |input: &str| {
            rules
                .iter()
                .filter(|rule| rule.matches(input))
                .map(|rule| rule.label.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(fired("refactor this"), vec!["magic-keywords"]);
        assert_eq!(
            fired("Ask Codex whether this is sound"),
            vec!["magic-keywords", "ask-codex"]
        );
        assert_eq!(fired("cc @gemini"), vec!["magic-keywords", "ask-gemini"]);
    }

    #[test]
    fn script_spec_splits_command_with_shlex() {
        let spec: RuleSpec = toml::from_str(
            r#"
label = "lint"
pattern = "lint"
action = { type = "script", command = "python3 'hooks/check lint.py' --fast", args = ["--json"] }
"#,
        )
        .expect("spec should parse");
        let rule = spec.compile().expect("spec should compile");
        assert_eq!(
            rule.action,
            Action::InvokeExternalScript {
                path: PathBuf::from("python3"),
                args: vec![
                    "hooks/check lint.py".to_string(),
                    "--fast".to_string(),
                    "--json".to_string()
                ],
            }
        );
    }

    #[test]
    fn ask_spec_defaults_to_plain_mode() {
        let spec: RuleSpec = toml::from_str(
            r#"
label = "second-opinion"
pattern = "second opinion"
action = { type = "ask", provider = "gemini" }
"#,
        )
        .expect("spec should parse");
        assert_eq!(
            spec.compile().expect("compile").action,
            Action::AskProvider {
                provider: ProviderId::Gemini,
                mode: ResponseMode::Plain,
            }
        );
    }

    #[test]
    fn empty_script_command_is_rejected() {
        let spec = RuleSpec {
            label: "empty".to_string(),
            pattern: None,
            action: ActionSpec::Script {
                command: "  ".to_string(),
                args: vec![],
            },
        };
        let error = spec.compile().expect_err("empty command");
        assert!(error.to_string().contains("cannot be empty"));
    }

    #[test]
    fn blank_pattern_means_always() {
        let spec = RuleSpec {
            label: String::new(),
            pattern: Some("   ".to_string()),
            action: ActionSpec::Text {
                text: "note".to_string(),
            },
        };
        let rule = spec.compile().expect("compile");
        assert!(rule.pattern.is_none());
        assert_eq!(rule.label, "unnamed-rule");
    }
}
