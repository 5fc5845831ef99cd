use std::sync::OnceLock;

use regex::{RegexSet, RegexSetBuilder};

/// How the orchestrator reacts to a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Abandon the provider now; retrying would only add pressure.
    SkipToFallback,
    /// Transient failure; retry the same provider after a backoff.
    Retryable,
    /// Unclassified; abandon the provider without retrying.
    Fail,
}

// Rate limiting, quota exhaustion and authorization failures.
const SKIP_PATTERNS: &[&str] = &[
    r"\b429\b",
    r"\b401\b",
    r"\b403\b",
    r"rate[\s_-]?limit",
    r"too many requests",
    r"quota",
    r"resource[\s_-]?exhausted",
    r"insufficient[\s_-]?(?:credits|balance)",
    r"unauthori[sz]ed",
    r"forbidden",
    r"permission[\s_-]?denied",
    r"invalid[\s_-]?api[\s_-]?key",
];

// 5xx statuses, overload and network-level failures.
const RETRY_PATTERNS: &[&str] = &[
    r"\b5\d\d\b",
    r"overloaded",
    r"service unavailable",
    r"bad gateway",
    r"internal server error",
    r"timed?[\s_-]?out",
    r"\btimeout\b",
    r"econnreset",
    r"econnrefused",
    r"econnaborted",
    r"etimedout",
    r"eai_again",
    r"connection (?:reset|refused|closed|aborted)",
    r"socket hang up",
    r"broken pipe",
    r"network error",
];

fn compile(patterns: &[&str]) -> RegexSet {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .expect("classifier patterns are valid regexes")
}

fn skip_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| compile(SKIP_PATTERNS))
}

fn retry_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| compile(RETRY_PATTERNS))
}

/// Classify a provider error message.
///
/// The skip set is always tested before the retry set. A message such as
/// `"HTTP 503: rate limit exceeded"` satisfies both and must come out as
/// [`ErrorClass::SkipToFallback`]; swapping the order would turn an
/// overloaded-quota condition into three more calls against the same provider.
pub fn classify(message: &str) -> ErrorClass {
    if skip_patterns().is_match(message) {
        return ErrorClass::SkipToFallback;
    }
    if retry_patterns().is_match(message) {
        return ErrorClass::Retryable;
    }
    ErrorClass::Fail
}
