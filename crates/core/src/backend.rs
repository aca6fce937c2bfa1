//! CompletionBackend trait — the abstraction over the model service.
//!
//! A backend knows how to send an ordered sequence of role-tagged turns to
//! a text-completion service and return the reply. The pipeline calls
//! `complete()` without knowing which backend is configured.
//!
//! Implementations: OpenAI-compatible endpoints (Ollama, OpenAI, vLLM, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// The role tag on a single prompt turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One ordered turn in the prompt sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request.
///
/// Turn order is significant and must be preserved on the wire: the
/// assembler established it and the backend serializes it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "llama3", "gpt-4o-mini")
    pub model: String,

    /// Ordered prompt turns
    pub turns: Vec<ChatTurn>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete reply from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// The generated text
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core CompletionBackend trait.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Send the ordered turns and get the complete reply.
    async fn complete(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatReply, BackendError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_constructors() {
        let turn = ChatTurn::system("You are a home assistant");
        assert_eq!(turn.role, TurnRole::System);
        assert_eq!(turn.content, "You are a home assistant");
    }

    #[test]
    fn turn_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TurnRole::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn request_defaults() {
        let req = ChatRequest {
            model: "llama3".into(),
            turns: vec![ChatTurn::user("hello")],
            temperature: default_temperature(),
            max_tokens: None,
        };
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("max_tokens"));
    }
}
