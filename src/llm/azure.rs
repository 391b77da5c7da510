//! Azure OpenAI chat-completions client.
//!
//! One POST per chat turn to the deployment-specific URL, `api-key` header,
//! JSON body `{messages, temperature, max_tokens}`. Wire types are private —
//! callers only ever see [`ChatMessage`](super::ChatMessage) in and
//! [`ChatReply`](super::ChatReply) out.
//!
//! Each request is wrapped in [`retry_with_backoff`]; the status→error
//! classification happens inside the retried closure, so rate limits and
//! server errors burn retry budget exactly like network failures do.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::retry::retry_with_backoff;
use super::{ChatMessage, ChatReply, LlmError, TokenUsage};

/// API version pinned into every request URL.
const API_VERSION: &str = "2025-01-01-preview";

/// Retry budget: 5 retries = 6 invocations worst case.
const RETRY_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

// ── Client ────────────────────────────────────────────────────────────────────

/// Client for a single Azure OpenAI deployment.
///
/// Cheap to clone — `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct AzureChatClient {
    client: Client,
    url: String,
    api_key: String,
}

impl AzureChatClient {
    /// Build a client from explicit parts.
    ///
    /// `endpoint` is the resource base URL; the deployment path and API
    /// version are appended here so the rest of the crate never sees URL
    /// assembly.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {e}")))?;

        let url = format!(
            "{}/openai/deployments/{model}/chat/completions?api-version={API_VERSION}",
            endpoint.trim_end_matches('/'),
        );

        Ok(Self { client, url, api_key: api_key.to_string() })
    }

    /// Build a client from loaded config.
    ///
    /// Missing endpoint or API key is a hard error here (config load only
    /// warns, so read-only store commands could still work in principle).
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            AppError::Config("AZURE_OPENAI_ENDPOINT is not set".to_string())
        })?;
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            AppError::Config("AZURE_OPENAI_APIKEY is not set".to_string())
        })?;
        Self::new(endpoint, api_key, &config.model, config.request_timeout)
            .map_err(AppError::from)
    }

    /// Send the assembled message list and return the assistant's reply.
    ///
    /// Retries transparently per the module policy; the error returned after
    /// an exhausted budget is the last attempt's, unmodified.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ChatReply, LlmError> {
        retry_with_backoff(
            || self.attempt(messages, temperature, max_tokens),
            RETRY_ATTEMPTS,
            RETRY_BASE_DELAY,
        )
        .await
    }

    /// Embedding generation — reserved, never implemented.
    pub async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::NotImplemented("embedding generation"))
    }

    /// One request/response cycle, no retry.
    async fn attempt(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ChatReply, LlmError> {
        let payload = ChatCompletionRequest { messages, temperature, max_tokens };

        debug!(
            url = %self.url,
            message_count = messages.len(),
            temperature,
            max_tokens,
            "sending chat request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full request payload");
        }

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat request failed (transport)");
                LlmError::from(e)
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            let err = classify_status(status, body);
            warn!(status, error = %err, "chat request returned HTTP error");
            return Err(err);
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        extract_reply(parsed)
    }
}

/// Map a non-2xx status to the error taxonomy. `body` is only kept for the
/// generic 4xx case, where it usually names the rejected field.
fn classify_status(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Auth,
        429 => LlmError::RateLimited,
        s if s >= 500 => LlmError::Server(s),
        s => LlmError::BadRequest { status: s, body },
    }
}

/// Pull the assistant text out of `choices[0].message.content`.
fn extract_reply(parsed: ChatCompletionResponse) -> Result<ChatReply, LlmError> {
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|s| !s.is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    if let Some(u) = &parsed.usage {
        debug!(
            prompt_tokens = u.prompt_tokens,
            completion_tokens = u.completion_tokens,
            "model usage"
        );
    }

    Ok(ChatReply { text, usage: parsed.usage })
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn url_embeds_deployment_and_api_version() {
        let c = AzureChatClient::new(
            "https://example.openai.azure.com/",
            "key",
            "gpt-4o",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            c.url,
            format!(
                "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version={API_VERSION}"
            )
        );
    }

    #[test]
    fn status_classification() {
        assert!(matches!(classify_status(401, String::new()), LlmError::Auth));
        assert!(matches!(classify_status(403, String::new()), LlmError::Auth));
        assert!(matches!(classify_status(429, String::new()), LlmError::RateLimited));
        assert!(matches!(classify_status(500, String::new()), LlmError::Server(500)));
        assert!(matches!(classify_status(503, String::new()), LlmError::Server(503)));
        assert!(matches!(
            classify_status(400, "oops".into()),
            LlmError::BadRequest { status: 400, .. }
        ));
    }

    #[test]
    fn request_serialises_expected_body() {
        let messages = vec![
            ChatMessage::new(Role::System, "be brief"),
            ChatMessage::new(Role::User, "hello"),
        ];
        let payload = ChatCompletionRequest { messages: &messages, temperature: 0.7, max_tokens: 100 };
        let v: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "hello");
        assert_eq!(v["max_tokens"], 100);
    }

    #[test]
    fn extract_reply_reads_first_choice() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            }"#,
        )
        .unwrap();
        let reply = extract_reply(parsed).unwrap();
        assert_eq!(reply.text, "hi there");
        assert_eq!(reply.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn extract_reply_rejects_missing_content() {
        let no_choices: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_reply(no_choices), Err(LlmError::EmptyResponse)));

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(extract_reply(null_content), Err(LlmError::EmptyResponse)));
    }

    #[tokio::test]
    async fn embed_is_not_implemented() {
        let c = AzureChatClient::new("https://e", "k", "m", Duration::from_secs(1)).unwrap();
        assert!(matches!(c.embed("text").await, Err(LlmError::NotImplemented(_))));
    }
}
