//! The seam between the extraction pipeline and a chat-capable model server.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::AiError;

/// A non-streaming chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: ChatOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// Base64-encoded images attached to this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Sampling options. `num_ctx` is kept small so vision models fit in memory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
    pub num_ctx: u32,
}

impl ChatRequest {
    /// A single user message addressed to `model`.
    pub fn user(model: impl Into<String>, content: impl Into<String>, options: ChatOptions) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: content.into(),
                images: Vec::new(),
            }],
            stream: false,
            options,
        }
    }

    /// Attach raw image bytes to the last message.
    pub fn with_image(mut self, image: &[u8]) -> Self {
        if let Some(msg) = self.messages.last_mut() {
            msg.images.push(STANDARD.encode(image));
        }
        self
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a chat request and return the assistant's reply text.
    async fn chat(&self, request: &ChatRequest) -> Result<String, AiError>;

    /// Names of the models available on the server.
    async fn list_models(&self) -> Result<Vec<String>, AiError>;
}

/// Whether a configured model name refers to a pulled model.
///
/// An untagged name matches its `:latest` tag; a tagged name must match exactly.
pub fn model_matches(configured: &str, pulled: &str) -> bool {
    if configured == pulled {
        return true;
    }
    !configured.contains(':') && pulled.strip_suffix(":latest") == Some(configured)
}
