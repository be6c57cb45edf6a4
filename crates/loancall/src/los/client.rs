use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use super::payload::LoanPayload;
use crate::config::{LosConfig, LosMode};
use crate::error::ConfigError;
use crate::sanitize::truncate_body;
use crate::secrets::resolve_secret;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LosError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("LOS returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LOS response did not contain a loan ID")]
    MissingLoanId,
}

impl From<reqwest::Error> for LosError {
    fn from(e: reqwest::Error) -> Self {
        LosError::Http(e.without_url().to_string())
    }
}

/// Creates loans in a loan-origination system.
#[async_trait]
pub trait LosClient: Send + Sync {
    /// Submits the loan and returns the LOS-assigned loan ID.
    async fn create_loan(&self, payload: &LoanPayload) -> Result<String, LosError>;

    fn name(&self) -> &str;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateLoanResponse {
    loan_id: Option<String>,
}

/// Encompass REST client: `POST {base}/loans` with a bearer token.
pub struct EncompassClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl EncompassClient {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            http: crate::http::build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl LosClient for EncompassClient {
    async fn create_loan(&self, payload: &LoanPayload) -> Result<String, LosError> {
        let response = self
            .http
            .post(format!("{}/loans", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LosError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let created: CreateLoanResponse = response.json().await?;
        created
            .loan_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(LosError::MissingLoanId)
    }

    fn name(&self) -> &str {
        "encompass"
    }
}

/// Assigns `EN-<0..999999>` IDs without contacting any LOS.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLos;

impl SimulatedLos {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LosClient for SimulatedLos {
    async fn create_loan(&self, _payload: &LoanPayload) -> Result<String, LosError> {
        let n = uuid::Uuid::new_v4().as_u128() % 1_000_000;
        Ok(format!("EN-{}", n))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Builds the LOS client selected by `los.mode`.
pub fn client_from_config(config: &LosConfig) -> Result<Arc<dyn LosClient>, ConfigError> {
    match config.mode {
        LosMode::Simulated => Ok(Arc::new(SimulatedLos::new())),
        LosMode::Encompass => {
            let base_url = config
                .base_url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .ok_or_else(|| ConfigError::Validation {
                    message: "los.base_url is required in encompass mode".to_string(),
                })?;
            let api_key = resolve_secret(
                config.api_key.as_deref(),
                config.api_key_file.as_deref(),
                config.api_key_env.as_deref(),
            )
            .map_err(|source| ConfigError::Secret {
                name: "los.api_key",
                source,
            })?;
            Ok(Arc::new(EncompassClient::new(base_url, api_key)?))
        }
    }
}
