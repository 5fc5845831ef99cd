//! Magic keyword detection.
//!
//! A prompt is scanned for registered directive keywords and their aliases
//! (whole word, case-insensitive). Matches are resolved to canonical entries,
//! deduplicated in order of first appearance, and pairs with a registered
//! synergy are folded into the synergy's text. The union of all matched flags
//! closes the annotation.

mod builtin;

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    /// Written to the session state when this keyword fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl KeywordEntry {
    pub fn canonical(
        name: impl Into<String>,
        description: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias_of: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynergyEntry {
    /// Unordered: `[a, b]` and `[b, a]` are the same synergy.
    pub pair: [String; 2],
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl SynergyEntry {
    pub fn new(pair: [&str; 2], output: impl Into<String>) -> Self {
        Self {
            pair: pair.map(str::to_string),
            output: output.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    fn same_pair(&self, other: &Self) -> bool {
        let key = |entry: &Self| {
            let mut pair = entry.pair.clone().map(|name| normalize_name(&name));
            pair.sort();
            pair
        };
        key(self) == key(other)
    }
}

#[derive(Clone, Debug, Default)]
pub struct KeywordRegistryBuilder {
    entries: Vec<KeywordEntry>,
    synergies: Vec<SynergyEntry>,
}

impl KeywordRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        Self {
            entries: builtin::keywords(),
            synergies: builtin::synergies(),
        }
    }

    /// Adds an entry, replacing any existing entry with the same name.
    pub fn keyword(mut self, entry: KeywordEntry) -> Self {
        let name = normalize_name(&entry.name);
        self.entries
            .retain(|existing| normalize_name(&existing.name) != name);
        self.entries.push(entry);
        self
    }

    /// Adds a synergy, replacing any existing synergy over the same pair.
    pub fn synergy(mut self, entry: SynergyEntry) -> Self {
        self.synergies.retain(|existing| !existing.same_pair(&entry));
        self.synergies.push(entry);
        self
    }

    pub fn build(self) -> Result<KeywordRegistry, ConfigError> {
        let mut canonical = Vec::new();
        let mut canonical_index = HashMap::new();
        let mut alias_targets = HashMap::new();

        for entry in self.entries {
            let name = normalize_name(&entry.name);
            if name.is_empty() {
                return Err(invalid_keyword(&entry.name, "name cannot be empty"));
            }
            if !has_word_edges(&name) {
                return Err(invalid_keyword(
                    &name,
                    "name must start and end with a letter, digit or underscore",
                ));
            }
            match entry.alias_of.as_deref().map(normalize_name) {
                Some(target) => {
                    if target.is_empty() {
                        return Err(invalid_keyword(&name, "alias target cannot be empty"));
                    }
                    alias_targets.insert(name, target);
                }
                None => {
                    if entry.output.trim().is_empty() {
                        return Err(invalid_keyword(&name, "keyword needs output text"));
                    }
                    canonical_index.insert(name.clone(), canonical.len());
                    canonical.push(KeywordEntry { name, ..entry });
                }
            }
        }

        let mut aliases = HashMap::new();
        for alias in alias_targets.keys() {
            let index = resolve_alias(alias, &alias_targets, &canonical_index)?;
            aliases.insert(alias.clone(), index);
        }

        let lookup = |name: &str| {
            let name = normalize_name(name);
            canonical_index
                .get(&name)
                .or_else(|| aliases.get(&name))
                .copied()
        };

        let mut synergies = HashMap::new();
        for synergy in self.synergies {
            let [first, second] = &synergy.pair;
            let a = lookup(first).ok_or_else(|| {
                invalid_keyword(first, "synergy member is not a registered keyword")
            })?;
            let b = lookup(second).ok_or_else(|| {
                invalid_keyword(second, "synergy member is not a registered keyword")
            })?;
            if a == b {
                return Err(invalid_keyword(
                    first,
                    "synergy needs two different keywords",
                ));
            }
            let entry: &KeywordEntry = &canonical[a];
            let other: &KeywordEntry = &canonical[b];
            let resolved = SynergyEntry {
                pair: [entry.name.clone(), other.name.clone()],
                ..synergy
            };
            synergies.insert(pair_key(a, b), resolved);
        }

        let mut matchers = Vec::with_capacity(canonical.len() + aliases.len());
        for (index, entry) in canonical.iter().enumerate() {
            matchers.push((word_matcher(&entry.name)?, index));
        }
        let mut alias_names = aliases.iter().collect::<Vec<_>>();
        alias_names.sort();
        for (alias, index) in alias_names {
            matchers.push((word_matcher(alias)?, *index));
        }

        Ok(KeywordRegistry {
            canonical,
            aliases,
            synergies,
            matchers,
        })
    }
}

#[derive(Clone, Debug)]
pub struct KeywordRegistry {
    canonical: Vec<KeywordEntry>,
    aliases: HashMap<String, usize>,
    synergies: HashMap<(usize, usize), SynergyEntry>,
    matchers: Vec<(Regex, usize)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordResolution {
    /// Canonical names in order of first appearance.
    pub keywords: Vec<String>,
    pub synergies: Vec<[String; 2]>,
    pub flags: Vec<String>,
    pub mode: Option<String>,
    pub text: String,
}

impl KeywordResolution {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl KeywordRegistry {
    pub fn builtin() -> Result<Self, ConfigError> {
        KeywordRegistryBuilder::with_builtins().build()
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.canonical
    }

    /// Looks up a canonical entry by its name or any alias.
    pub fn get(&self, name: &str) -> Option<&KeywordEntry> {
        let name = normalize_name(name);
        self.canonical
            .iter()
            .position(|entry| entry.name == name)
            .or_else(|| self.aliases.get(&name).copied())
            .map(|index| &self.canonical[index])
    }

    pub fn resolve(&self, input: &str) -> KeywordResolution {
        let cleaned = strip_code_and_urls(input);
        let ordered = self.ordered_matches(&cleaned);
        if ordered.is_empty() {
            return KeywordResolution::default();
        }

        // folded[i] = Some((synergy key, is earlier member))
        let mut folded: Vec<Option<((usize, usize), bool)>> = vec![None; ordered.len()];
        let mut taken = Vec::new();
        for i in 0..ordered.len() {
            if folded[i].is_some() {
                continue;
            }
            for j in (i + 1)..ordered.len() {
                if folded[j].is_some() {
                    continue;
                }
                let key = pair_key(ordered[i], ordered[j]);
                if self.synergies.contains_key(&key) {
                    folded[i] = Some((key, true));
                    folded[j] = Some((key, false));
                    taken.push(key);
                    break;
                }
            }
        }

        let mut lines = Vec::new();
        for (position, index) in ordered.iter().enumerate() {
            match folded[position] {
                None => lines.push(self.canonical[*index].output.trim().to_string()),
                Some((key, true)) => {
                    if let Some(synergy) = self.synergies.get(&key) {
                        lines.push(synergy.output.trim().to_string());
                    }
                }
                Some((_, false)) => {}
            }
        }

        let mut seen = HashSet::new();
        let flags = ordered
            .iter()
            .flat_map(|index| self.canonical[*index].flags.iter())
            .map(|flag| flag.trim())
            .filter(|flag| !flag.is_empty())
            .filter(|flag| seen.insert(flag.to_string()))
            .map(str::to_string)
            .collect::<Vec<_>>();
        if !flags.is_empty() {
            lines.push(format!("flags: {}", flags.join(", ")));
        }

        let synergy_mode = taken
            .iter()
            .filter_map(|key| self.synergies.get(key))
            .find_map(|synergy| synergy.mode.clone());
        let mode = synergy_mode.or_else(|| {
            ordered
                .iter()
                .find_map(|index| self.canonical[*index].mode.clone())
        });

        KeywordResolution {
            keywords: ordered
                .iter()
                .map(|index| self.canonical[*index].name.clone())
                .collect(),
            synergies: taken
                .iter()
                .filter_map(|key| self.synergies.get(key))
                .map(|synergy| synergy.pair.clone())
                .collect(),
            flags,
            mode,
            text: lines.join("\n"),
        }
    }

    /// Canonical indices ordered by first appearance of the keyword or any
    /// of its aliases.
    fn ordered_matches(&self, text: &str) -> Vec<usize> {
        let mut first_seen: HashMap<usize, usize> = HashMap::new();
        for (matcher, index) in &self.matchers {
            if let Some(found) = matcher.find(text) {
                first_seen
                    .entry(*index)
                    .and_modify(|position| *position = (*position).min(found.start()))
                    .or_insert(found.start());
            }
        }
        let mut ordered = first_seen.into_iter().collect::<Vec<_>>();
        ordered.sort_by_key(|(index, position)| (*position, *index));
        ordered.into_iter().map(|(index, _)| index).collect()
    }
}

fn resolve_alias(
    alias: &str,
    alias_targets: &HashMap<String, String>,
    canonical_index: &HashMap<String, usize>,
) -> Result<usize, ConfigError> {
    let mut visited = HashSet::new();
    let mut current = alias;
    loop {
        if !visited.insert(current.to_string()) {
            return Err(invalid_keyword(alias, "alias chain forms a cycle"));
        }
        let Some(target) = alias_targets.get(current) else {
            return Err(invalid_keyword(
                alias,
                &format!("alias target '{current}' is not registered"),
            ));
        };
        if let Some(index) = canonical_index.get(target) {
            return Ok(*index);
        }
        current = target;
    }
}

fn word_matcher(name: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name))).map_err(|error| {
        invalid_keyword(name, &format!("cannot build matcher: {error}"))
    })
}

/// `\b` only anchors next to word characters, so a name like `c++` or
/// `/plan` could never match.
fn has_word_edges(name: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    name.chars().next().is_some_and(is_word) && name.chars().next_back().is_some_and(is_word)
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn invalid_keyword(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidKeyword {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn ignored_spans() -> &'static Regex {
    static SPANS: OnceLock<Regex> = OnceLock::new();
    SPANS.get_or_init(|| {
        Regex::new(r"(?s)```.*?(?:```|\z)|`[^`\n]*`|\b(?:https?|ftp)://\S+|\bwww\.\S+")
            .expect("ignored span pattern is a valid regex")
    })
}

/// Blanks out fenced code, inline code and URLs.
pub fn strip_code_and_urls(input: &str) -> String {
    ignored_spans().replace_all(input, " ").into_owned()
}
