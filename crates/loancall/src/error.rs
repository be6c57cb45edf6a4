use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy shared by every orchestrator.
///
/// Persisted alongside `status = error` on call jobs so the dashboard can
/// tell a missing artifact from a model outage without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    JobNotFound,
    ArtifactUnavailable,
    TranscriptionFailed,
    ExtractionFailed,
    ExtractionMalformed,
    PushFailed,
    InvalidSignature,
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::JobNotFound => "JobNotFound",
            ErrorKind::ArtifactUnavailable => "ArtifactUnavailable",
            ErrorKind::TranscriptionFailed => "TranscriptionFailed",
            ErrorKind::ExtractionFailed => "ExtractionFailed",
            ErrorKind::ExtractionMalformed => "ExtractionMalformed",
            ErrorKind::PushFailed => "PushFailed",
            ErrorKind::InvalidSignature => "InvalidSignature",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = crate::model::UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "JobNotFound" => Ok(ErrorKind::JobNotFound),
            "ArtifactUnavailable" => Ok(ErrorKind::ArtifactUnavailable),
            "TranscriptionFailed" => Ok(ErrorKind::TranscriptionFailed),
            "ExtractionFailed" => Ok(ErrorKind::ExtractionFailed),
            "ExtractionMalformed" => Ok(ErrorKind::ExtractionMalformed),
            "PushFailed" => Ok(ErrorKind::PushFailed),
            "InvalidSignature" => Ok(ErrorKind::InvalidSignature),
            "StoreUnavailable" => Ok(ErrorKind::StoreUnavailable),
            other => Err(crate::model::UnknownVariant::new("error kind", other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoanCallError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Artifact storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Call processing error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("LOS push error: {0}")]
    Push(#[from] crate::los::PushError),

    #[error("Billing webhook error: {0}")]
    Webhook(#[from] crate::billing::WebhookError),

    #[error("Invalid record: {0}")]
    Validation(#[from] crate::model::ValidationError),
}

impl LoanCallError {
    /// Taxonomy kind, when the failure belongs to one of the core flows.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            LoanCallError::Config(_) | LoanCallError::Validation(_) => None,
            LoanCallError::Storage(_) => Some(ErrorKind::ArtifactUnavailable),
            LoanCallError::Database(_) => Some(ErrorKind::StoreUnavailable),
            LoanCallError::Pipeline(e) => Some(e.kind()),
            LoanCallError::Push(e) => Some(e.kind()),
            LoanCallError::Webhook(e) => e.kind(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve secret '{name}': {source}")]
    Secret {
        name: &'static str,
        #[source]
        source: crate::secrets::SecretError,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid artifact path '{0}'")]
    InvalidPath(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read artifact '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact already exists: {0}")]
    FileExists(PathBuf),

    #[error("Artifact '{reference}' is empty")]
    Empty { reference: String },

    #[error("Failed to fetch artifact '{reference}': {message}")]
    Fetch { reference: String, message: String },

    #[error("Failed to upload artifact '{path}': {message}")]
    Upload { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, LoanCallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_round_trips_through_str() {
        for kind in [
            ErrorKind::JobNotFound,
            ErrorKind::ArtifactUnavailable,
            ErrorKind::TranscriptionFailed,
            ErrorKind::ExtractionFailed,
            ErrorKind::ExtractionMalformed,
            ErrorKind::PushFailed,
            ErrorKind::InvalidSignature,
            ErrorKind::StoreUnavailable,
        ] {
            assert_eq!(kind.as_str().parse::<ErrorKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_error_kind_is_rejected() {
        assert!("Timeout".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_storage_errors_map_to_artifact_unavailable() {
        let err = LoanCallError::from(StorageError::InvalidPath("../etc".to_string()));
        assert_eq!(err.kind(), Some(ErrorKind::ArtifactUnavailable));
    }
}
