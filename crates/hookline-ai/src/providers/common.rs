use std::sync::OnceLock;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::{ProviderId, ResponseMode};

pub(super) fn join_url(base_url: &str, path: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

pub(super) fn shared_http_client(base_url: &str) -> &'static Client {
    static DEFAULT_CLIENT: OnceLock<Client> = OnceLock::new();
    static LOOPBACK_CLIENT: OnceLock<Client> = OnceLock::new();

    if is_loopback_base_url(base_url) {
        LOOPBACK_CLIENT.get_or_init(|| {
            Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| Client::new())
        })
    } else {
        DEFAULT_CLIENT.get_or_init(Client::new)
    }
}

pub(super) fn is_loopback_base_url(base_url: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(base_url) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "::1"
}

pub(super) fn transport_error(provider: ProviderId, error: reqwest::Error) -> ProviderError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection refused or unreachable: {error}")
    } else {
        error.to_string()
    };
    ProviderError::Transport { provider, message }
}

/// Returns the body of a 2xx response, or an `Http` error carrying the status.
pub(super) async fn read_success_body(
    provider: ProviderId,
    response: Response,
) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|error| transport_error(provider, error))?;
    if !status.is_success() {
        return Err(ProviderError::Http {
            provider,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    Ok(body)
}

pub(super) fn parse_body(provider: ProviderId, body: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(body).map_err(|error| {
        ProviderError::protocol(provider, format!("response body is not JSON: {error}"))
    })
}

/// Final shaping of the provider text for the requested mode.
pub(super) fn finish_text(
    provider: ProviderId,
    mode: ResponseMode,
    text: String,
) -> Result<String, ProviderError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::protocol(provider, "empty response"));
    }
    match mode {
        ResponseMode::Plain => Ok(trimmed.to_string()),
        ResponseMode::JsonStrict => {
            let candidate = strip_json_fence(trimmed);
            serde_json::from_str::<Value>(candidate).map_err(|error| {
                ProviderError::InvalidJson {
                    provider,
                    message: error.to_string(),
                }
            })?;
            Ok(candidate.to_string())
        }
    }
}

fn strip_json_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

const MAX_ERROR_BODY_CHARS: usize = 500;

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated = body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_trailing_slash() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            join_url("https://api.openai.com/v1", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn loopback_detection_covers_localhost_forms() {
        assert!(is_loopback_base_url("http://127.0.0.1:8080/v1"));
        assert!(is_loopback_base_url("http://LOCALHOST:1234"));
        assert!(!is_loopback_base_url("https://api.openai.com/v1"));
        assert!(!is_loopback_base_url("not a url"));
    }

    #[test]
    fn json_mode_unwraps_fenced_json() {
        let text = finish_text(
            ProviderId::Codex,
            ResponseMode::JsonStrict,
            "```json\n{\"ok\":true}\n```".to_string(),
        )
        .expect("fenced json should be accepted");
        assert_eq!(text, "{\"ok\":true}");
    }

    #[test]
    fn json_mode_rejects_prose() {
        let error = finish_text(
            ProviderId::Gemini,
            ResponseMode::JsonStrict,
            "Sure! Here is the answer".to_string(),
        )
        .expect_err("prose is not json");
        assert!(matches!(error, ProviderError::InvalidJson { .. }));
    }

    #[test]
    fn empty_text_is_a_protocol_error() {
        let error = finish_text(ProviderId::Codex, ResponseMode::Plain, "  \n".to_string())
            .expect_err("empty text");
        assert!(error.to_string().contains("empty response"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
    }
}
