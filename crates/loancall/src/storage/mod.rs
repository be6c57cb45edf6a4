//! Artifact storage for call audio.
//!
//! Artifacts are addressed by an opaque relative path (`calls/<millis>.webm`);
//! `url_for` turns a path into the reference stored on the call record and
//! `fetch` accepts either form.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ArtifactsConfig;
use crate::error::{ConfigError, StorageError};
use crate::secrets::{expand_home, resolve_secret_optional};

pub mod filesystem;
pub mod http;

pub use filesystem::FileArtifactStore;
pub use http::HttpArtifactStore;

/// Audio bytes plus what a transcription endpoint needs to name the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl AudioClip {
    /// Builds a clip, guessing the content type from the file extension.
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            bytes,
            file_name,
            content_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Durably stores `bytes` at `path`. Existing artifacts are never overwritten.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Retrieves an artifact by URL or store path.
    async fn fetch(&self, reference: &str) -> Result<AudioClip, StorageError>;

    /// The retrievable URL for a stored path.
    fn url_for(&self, path: &str) -> String;
}

/// Rejects empty, absolute and parent-escaping artifact paths.
pub(crate) fn validate_path(path: &str) -> Result<(), StorageError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Last path segment of a reference, without query or fragment.
pub(crate) fn file_name_of(reference: &str) -> String {
    let without_query = reference.split(['?', '#']).next().unwrap_or(reference);
    without_query
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("audio")
        .to_string()
}

/// Builds the artifact store selected by `artifacts.kind`.
pub fn store_from_config(config: &ArtifactsConfig) -> Result<Arc<dyn ArtifactStore>, ConfigError> {
    match config {
        ArtifactsConfig::Filesystem {
            root,
            public_base_url,
        } => {
            let mut store = FileArtifactStore::new(expand_home(root));
            if let Some(base) = public_base_url.as_deref().filter(|b| !b.is_empty()) {
                store = store.with_public_base_url(base);
            }
            Ok(Arc::new(store))
        }
        ArtifactsConfig::Http {
            base_url,
            token,
            token_file,
            token_env,
        } => {
            let token = resolve_secret_optional(
                token.as_deref(),
                token_file.as_deref(),
                token_env.as_deref(),
            )
            .map_err(|source| ConfigError::Secret {
                name: "artifacts.token",
                source,
            })?;
            Ok(Arc::new(HttpArtifactStore::new(base_url, token)?))
        }
    }
}
