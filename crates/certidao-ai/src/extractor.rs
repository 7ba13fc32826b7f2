//! Two-model deed extraction: a vision model transcribes the image, a text
//! model restructures the transcription into the fixed field set.

use std::path::{Path, PathBuf};

use certidao_core::{CertidaoRecord, CoreError, extract_json_object};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::AiError;
use crate::backend::{ChatBackend, ChatOptions, ChatRequest, model_matches};
use crate::prompt::{VISION_PROMPT, structuring_prompt};

pub const DEFAULT_VISION_MODEL: &str = "llama3.2-vision";
pub const DEFAULT_TEXT_MODEL: &str = "llama3";
pub const DEFAULT_NUM_CTX: u32 = 2048;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a recognised image format")]
    UnsupportedImage(PathBuf),
    #[error("models not pulled on the server: {}", .0.join(", "))]
    ModelsMissing(Vec<String>),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Parse(#[from] CoreError),
}

/// Which models to call and how.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub vision_model: String,
    pub text_model: String,
    pub temperature: f32,
    pub num_ctx: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            temperature: 0.0,
            num_ctx: DEFAULT_NUM_CTX,
        }
    }
}

impl ModelConfig {
    fn options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.temperature,
            num_ctx: self.num_ctx,
        }
    }
}

/// Everything produced by one run, kept so callers can show intermediate text.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Raw transcription from the vision model.
    pub transcript: String,
    /// Raw reply from the text model.
    pub reply: String,
    /// JSON object recovered from `reply`, as the model wrote it.
    pub json: Value,
    pub record: CertidaoRecord,
}

pub struct DeedExtractor<B> {
    backend: B,
    config: ModelConfig,
}

impl<B: ChatBackend> DeedExtractor<B> {
    pub fn new(backend: B, config: ModelConfig) -> Self {
        Self { backend, config }
    }

    /// Check that both configured models are pulled on the server.
    pub async fn preflight(&self) -> Result<(), ExtractError> {
        let pulled = self.backend.list_models().await?;
        let missing: Vec<String> = [&self.config.vision_model, &self.config.text_model]
            .into_iter()
            .filter(|m| !pulled.iter().any(|p| model_matches(m, p)))
            .cloned()
            .collect();

        if missing.is_empty() {
            info!(models = pulled.len(), "model server ready");
            Ok(())
        } else {
            Err(ExtractError::ModelsMissing(missing))
        }
    }

    /// Ask the vision model for all visible text in the image.
    pub async fn transcribe(&self, image: &[u8]) -> Result<String, ExtractError> {
        let request = ChatRequest::user(
            self.config.vision_model.as_str(),
            VISION_PROMPT,
            self.config.options(),
        )
        .with_image(image);
        let text = self.backend.chat(&request).await?;
        info!(chars = text.chars().count(), "transcribed image");
        Ok(text)
    }

    /// Ask the text model to restructure a transcription into the field set.
    pub async fn structure(&self, text: &str) -> Result<String, ExtractError> {
        let request = ChatRequest::user(
            self.config.text_model.as_str(),
            structuring_prompt(text),
            self.config.options(),
        );
        Ok(self.backend.chat(&request).await?)
    }

    /// Run the whole pipeline on an image file.
    pub async fn extract(&self, image_path: &Path) -> Result<Extraction, ExtractError> {
        let image = load_image(image_path).await?;
        self.extract_image(&image).await
    }

    /// Run the whole pipeline on image bytes already in memory.
    pub async fn extract_image(&self, image: &[u8]) -> Result<Extraction, ExtractError> {
        let transcript = self.transcribe(image).await?;
        let reply = self.structure(&transcript).await?;
        let json = extract_json_object(&reply)?;
        let record = CertidaoRecord::from_json(&json)?;

        if record.is_empty() {
            warn!("model reply contained none of the expected fields");
            debug!(reply = %reply, "text model reply");
        } else {
            info!(filled = record.filled_count(), "structured certificate");
        }

        Ok(Extraction {
            transcript,
            reply,
            json,
            record,
        })
    }
}

/// Read an image file, rejecting missing paths and non-image content.
pub async fn load_image(path: &Path) -> Result<Vec<u8>, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::ImageNotFound(path.to_path_buf()));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ExtractError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;

    let format = image::guess_format(&bytes)
        .map_err(|_| ExtractError::UnsupportedImage(path.to_path_buf()))?;
    info!(path = %path.display(), bytes = bytes.len(), format = ?format, "loaded image");
    Ok(bytes)
}
