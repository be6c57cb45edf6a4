use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::{file_name_of, validate_path, ArtifactStore, AudioClip};
use crate::error::{ConfigError, StorageError};
use crate::sanitize::{redact_url, truncate_body};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Object storage reached with plain `PUT`/`GET` against `{base_url}/{path}`.
pub struct HttpArtifactStore {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpArtifactStore {
    pub fn new(base_url: &str, token: Option<SecretString>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: crate::http::build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    fn resolve(&self, reference: &str) -> Result<String, StorageError> {
        if reference.starts_with("https://") || reference.starts_with("http://") {
            return Ok(reference.to_string());
        }
        validate_path(reference)?;
        Ok(self.url_for(reference))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_path(path)?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let request = self
            .client
            .put(self.url_for(path))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            // Object stores that honor it refuse to replace an existing object.
            .header(reqwest::header::IF_NONE_MATCH, "*")
            .body(bytes.to_vec());

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                path: path.to_string(),
                message: format!("HTTP {}: {}", status, truncate_body(&body)),
            });
        }

        log::debug!("Uploaded artifact {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    async fn fetch(&self, reference: &str) -> Result<AudioClip, StorageError> {
        let url = self.resolve(reference)?;
        let fetch_error = |message: String| StorageError::Fetch {
            reference: redact_url(reference),
            message,
        };

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| fetch_error(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.without_url().to_string()))?;
        if bytes.is_empty() {
            return Err(StorageError::Empty {
                reference: redact_url(reference),
            });
        }

        Ok(AudioClip::new(bytes.to_vec(), file_name_of(reference)))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}
