use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{AdapterError, OpenAiClient};
use crate::storage::AudioClip;

/// Speech-to-text adapter.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the clip to plain text. Empty results are errors.
    async fn transcribe(&self, audio: &AudioClip) -> Result<String, AdapterError>;

    fn model_name(&self) -> &str;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcription through `/v1/audio/transcriptions`.
pub struct WhisperTranscriber {
    client: OpenAiClient,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioClip) -> Result<String, AdapterError> {
        if audio.is_empty() {
            return Err(AdapterError::EmptyAudio);
        }

        let part = Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.content_type)
            .map_err(AdapterError::from)?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response: TranscriptionResponse = self
            .client
            .post_multipart("/v1/audio/transcriptions", form)
            .await?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(AdapterError::EmptyTranscript);
        }
        Ok(text.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Stands in when no API key is available; every call fails.
pub struct UnconfiguredTranscriber;

#[async_trait]
impl Transcriber for UnconfiguredTranscriber {
    async fn transcribe(&self, _audio: &AudioClip) -> Result<String, AdapterError> {
        Err(AdapterError::Unconfigured(
            "Transcription (no OpenAI API key)".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "unconfigured"
    }
}
