//! OpenAI-compatible completion backend.
//!
//! Works with: Ollama (its `/v1` endpoint), OpenAI, vLLM, and any other
//! OpenAI-compatible chat-completions server. Non-streaming only, since
//! the pipeline wants exactly one reply per call.
//!
//! Turn order from the request is serialized as-is, so the chronology the
//! context assembler established survives onto the wire.

use async_trait::async_trait;
use murmur_core::backend::{ChatReply, ChatRequest, ChatTurn, CompletionBackend, TurnRole, Usage};
use murmur_core::error::BackendError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible completion backend.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs,
            client,
        }
    }

    /// Create an Ollama backend (convenience constructor).
    pub fn ollama(base_url: Option<&str>, timeout_secs: u64) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            timeout_secs,
        )
    }

    /// Create an OpenAI backend (convenience constructor).
    pub fn openai(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, timeout_secs)
    }

    /// Convert our turns to OpenAI API format, preserving order.
    fn to_api_messages(turns: &[ChatTurn]) -> Vec<ApiMessage> {
        turns
            .iter()
            .map(|t| ApiMessage {
                role: match t.role {
                    TurnRole::System => "system".into(),
                    TurnRole::User => "user".into(),
                    TurnRole::Assistant => "assistant".into(),
                },
                content: t.content.clone(),
            })
            .collect()
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(backend = %self.name, model = %request.model, turns = request.turns.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(BackendError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| BackendError::Api {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(BackendError::EmptyCompletion)?;

        let text = choice.message.content;
        if text.is_empty() {
            return Err(BackendError::EmptyCompletion);
        }

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatReply {
            text,
            model: api_response.model,
            usage,
        })
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_constructor() {
        let backend = OpenAiCompatBackend::ollama(None, 120);
        assert_eq!(backend.name(), "ollama");
        assert!(backend.base_url.contains("localhost:11434"));
    }

    #[test]
    fn ollama_custom_host() {
        let backend = OpenAiCompatBackend::ollama(Some("http://host.docker.internal:11434/v1/"), 60);
        assert_eq!(backend.base_url, "http://host.docker.internal:11434/v1");
    }

    #[test]
    fn openai_constructor() {
        let backend = OpenAiCompatBackend::openai("sk-test", 120);
        assert_eq!(backend.name(), "openai");
        assert!(backend.base_url.contains("api.openai.com"));
    }

    #[test]
    fn turn_conversion_preserves_order() {
        let turns = vec![
            ChatTurn::system("You are helpful"),
            ChatTurn::system("Earlier: the NAS went down"),
            ChatTurn::user("what happened?"),
            ChatTurn::assistant("The NAS lost power."),
            ChatTurn::user("is it back?"),
        ];
        let api = OpenAiCompatBackend::to_api_messages(&turns);
        let roles: Vec<&str> = api.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "system", "user", "assistant", "user"]);
        assert_eq!(api[1].content, "Earlier: the NAS went down");
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "llama3",
            "choices": [{"message": {"role": "assistant", "content": "Lights are on."}}],
            "usage": {"prompt_tokens": 42, "completion_tokens": 4, "total_tokens": 46}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model, "llama3");
        assert_eq!(parsed.choices[0].message.content, "Lights are on.");
        assert_eq!(parsed.usage.as_ref().unwrap().total_tokens, 46);
    }

    #[test]
    fn parse_response_without_usage() {
        let data = r#"{"model": "llama3", "choices": [{"message": {"content": "ok"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn parse_response_with_null_like_content() {
        // Some servers omit content entirely on empty completions
        let data = r#"{"model": "llama3", "choices": [{"message": {}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].message.content.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        // Nothing listens on this port; the connect error must map to the
        // retryable variant, not a panic or an API error.
        let backend = OpenAiCompatBackend::new("test", "http://127.0.0.1:9", "none", 5);
        let err = backend
            .complete(ChatRequest {
                model: "llama3".into(),
                turns: vec![ChatTurn::user("hello")],
                temperature: 0.7,
                max_tokens: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "got non-retryable error: {err}");
    }
}
