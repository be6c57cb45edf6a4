//! Model adapters: speech-to-text and structured extraction.
//!
//! Both are traits so the orchestrator can run against OpenAI-compatible
//! endpoints, the offline keyword extractor, or test doubles.

use std::sync::Arc;

use thiserror::Error;

use crate::config::OpenAiConfig;
use crate::error::ConfigError;
use crate::secrets::resolve_secret_optional;

pub mod client;
pub mod extractor;
pub mod keyword;
pub mod mock;
pub mod prompt;
pub mod transcriber;

pub use client::OpenAiClient;
pub use extractor::{parse_analysis, ChatExtractor, Extractor};
pub use keyword::KeywordExtractor;
pub use mock::{MockExtractor, MockTranscriber};
pub use transcriber::{Transcriber, UnconfiguredTranscriber, WhisperTranscriber};

/// Errors from a model adapter call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Audio is empty")]
    EmptyAudio,

    #[error("Transcription returned no text")]
    EmptyTranscript,

    #[error("Response contained no message content")]
    MissingContent,

    #[error("Malformed extraction response: {0}")]
    Malformed(String),

    #[error("{0} is not configured")]
    Unconfigured(String),
}

impl AdapterError {
    /// True when the provider answered but the payload could not be used.
    pub fn is_malformed(&self) -> bool {
        matches!(self, AdapterError::Malformed(_))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        AdapterError::Http(e.without_url().to_string())
    }
}

/// The adapter pair for the configured provider. Without an API key,
/// transcription fails every request and extraction uses keyword rules.
pub fn adapters_from_config(
    config: &OpenAiConfig,
) -> Result<(Arc<dyn Transcriber>, Arc<dyn Extractor>), ConfigError> {
    let api_key = resolve_secret_optional(
        config.api_key.as_deref(),
        config.api_key_file.as_deref(),
        config.api_key_env.as_deref(),
    )
    .map_err(|source| ConfigError::Secret {
        name: "openai.api_key",
        source,
    })?;

    match api_key {
        Some(key) => {
            let client = OpenAiClient::new(&config.base_url, key)?;
            Ok((
                Arc::new(WhisperTranscriber::new(
                    client.clone(),
                    config.transcription_model.clone(),
                )),
                Arc::new(ChatExtractor::new(client, config.extraction_model.clone())),
            ))
        }
        None => {
            tracing::warn!("No OpenAI API key configured, transcription is disabled");
            Ok((
                Arc::new(UnconfiguredTranscriber),
                Arc::new(KeywordExtractor::new()),
            ))
        }
    }
}
