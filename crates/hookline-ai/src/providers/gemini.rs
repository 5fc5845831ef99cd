use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::common::{
    finish_text, join_url, parse_body, read_success_body, shared_http_client, transport_error,
};
use crate::error::ProviderError;
use crate::provider::{ProviderClient, ProviderSettings};
use crate::types::{ProviderCall, ProviderId, ResponseMode};

const PROVIDER: ProviderId = ProviderId::Gemini;

/// Gemini over the Generative Language `generateContent` API.
pub struct GeminiClient {
    settings: ProviderSettings,
}

impl GeminiClient {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    async fn call(&self, call: &ProviderCall) -> Result<String, ProviderError> {
        let api_key = self.settings.resolve_api_key(PROVIDER)?;
        let endpoint = join_url(
            &self.settings.base_url,
            &generate_content_path(&self.settings.model),
        );
        let payload = build_generate_payload(call);
        debug!(provider = %PROVIDER, endpoint = %endpoint, mode = %call.mode, "sending generateContent");

        let response = shared_http_client(&self.settings.base_url)
            .post(endpoint.as_str())
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .timeout(self.settings.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport_error(PROVIDER, error))?;

        let body = read_success_body(PROVIDER, response).await?;
        let value = parse_body(PROVIDER, &body)?;
        if let Some(reason) = blocked_reason(&value) {
            return Err(ProviderError::protocol(
                PROVIDER,
                format!("prompt blocked: {reason}"),
            ));
        }
        let text = extract_candidate_text(&value).ok_or_else(|| {
            ProviderError::protocol(PROVIDER, "response has no candidates[0].content.parts")
        })?;
        finish_text(PROVIDER, call.mode, text)
    }
}

fn generate_content_path(model: &str) -> String {
    let trimmed = model.trim().trim_start_matches('/');
    let without_suffix = trimmed.strip_suffix(":generateContent").unwrap_or(trimmed);
    if without_suffix.starts_with("models/") {
        format!("{without_suffix}:generateContent")
    } else {
        format!("models/{without_suffix}:generateContent")
    }
}

fn build_generate_payload(call: &ProviderCall) -> Value {
    let mut payload = json!({
        "systemInstruction": { "parts": [{ "text": call.system_prompt }] },
        "contents": [{ "role": "user", "parts": [{ "text": call.prompt }] }],
    });
    if call.mode == ResponseMode::JsonStrict {
        payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
    }
    payload
}

fn extract_candidate_text(value: &Value) -> Option<String> {
    let parts = value
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    Some(
        parts
            .iter()
            // Thought summaries are not part of the answer.
            .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
    )
}

fn blocked_reason(value: &Value) -> Option<&str> {
    value
        .get("promptFeedback")?
        .get("blockReason")?
        .as_str()
}
