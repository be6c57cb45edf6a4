use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::AdapterError;
use crate::error::ConfigError;
use crate::sanitize::truncate_body;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Minimal client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            http: crate::http::build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AdapterError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn post_multipart<R>(&self, path: &str, form: Form) -> Result<R, AdapterError>
    where
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, AdapterError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(response.json::<R>().await?)
    }
}
