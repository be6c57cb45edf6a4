use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::ErrorKind;

/// Request-scoped failures: nothing was recorded on the job.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Call '{0}' not found")]
    JobNotFound(String),

    #[error("Job store unavailable: {0}")]
    Store(#[from] DatabaseError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::JobNotFound(_) => ErrorKind::JobNotFound,
            PipelineError::Store(_) => ErrorKind::StoreUnavailable,
        }
    }
}

/// Record-scoped failure of one step; written to the job as its terminal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: ErrorKind,
    pub cause: String,
}

impl StepFailure {
    pub fn new(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }
}
