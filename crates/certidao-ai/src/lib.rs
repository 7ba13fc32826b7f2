//! Model inference layer: Ollama chat client, prompts, and the two-model deed extractor.

pub mod backend;
pub mod extractor;
pub mod ollama;
pub mod prompt;

pub use backend::{ChatBackend, ChatMessage, ChatOptions, ChatRequest};
pub use extractor::{DeedExtractor, ExtractError, Extraction, ModelConfig, load_image};
pub use ollama::{AiError, OllamaClient};
