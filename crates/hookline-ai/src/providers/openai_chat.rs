use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::common::{
    finish_text, join_url, parse_body, read_success_body, shared_http_client, transport_error,
};
use crate::error::ProviderError;
use crate::provider::{ProviderClient, ProviderSettings};
use crate::types::{ProviderCall, ProviderId, ResponseMode};

const PROVIDER: ProviderId = ProviderId::Codex;

/// Codex over the OpenAI chat completions API.
pub struct OpenAiChatClient {
    settings: ProviderSettings,
}

impl OpenAiChatClient {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ProviderClient for OpenAiChatClient {
    async fn call(&self, call: &ProviderCall) -> Result<String, ProviderError> {
        let api_key = self.settings.resolve_api_key(PROVIDER)?;
        let endpoint = join_url(&self.settings.base_url, "chat/completions");
        let payload = build_chat_payload(&self.settings.model, call);
        debug!(provider = %PROVIDER, endpoint = %endpoint, mode = %call.mode, "sending chat completion");

        let response = shared_http_client(&self.settings.base_url)
            .post(endpoint.as_str())
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .timeout(self.settings.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| transport_error(PROVIDER, error))?;

        let body = read_success_body(PROVIDER, response).await?;
        let value = parse_body(PROVIDER, &body)?;
        let text = extract_chat_text(&value).ok_or_else(|| {
            ProviderError::protocol(PROVIDER, "response has no choices[0].message.content")
        })?;
        finish_text(PROVIDER, call.mode, text)
    }
}

fn build_chat_payload(model: &str, call: &ProviderCall) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": call.system_prompt },
            { "role": "user", "content": call.prompt },
        ],
    });
    if call.mode == ResponseMode::JsonStrict {
        payload["response_format"] = json!({ "type": "json_object" });
    }
    payload
}

fn extract_chat_text(value: &Value) -> Option<String> {
    let content = value
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;
    match content {
        Value::String(text) => Some(text.clone()),
        // Some compatible servers return content parts.
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
        ),
        _ => None,
    }
}
