//! Call intake: the writes that happen before and after the pipeline runs.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::{ApplicationStore, CallStore};
use crate::error::Result;
use crate::model::{
    ApplicationStatus, CallJob, CallStatus, ClientContact, LoanApplication, LoanInfo,
    NewApplication, NewCall, ValidationError,
};
use crate::pipeline::PipelineError;
use crate::storage::{validate_path, ArtifactStore};

/// Dashboard defaults for loan fields a call did not determine.
pub const DEFAULT_LOAN_AMOUNT: f64 = 360_000.0;
pub const DEFAULT_LOAN_TYPE: &str = "Conventional";
pub const DEFAULT_PROPERTY_TYPE: &str = "Single Family Home";
pub const DEFAULT_INTEREST_RATE: f64 = 6.25;
pub const DEFAULT_TERM_YEARS: u32 = 30;

const DEFAULT_AUDIO_EXTENSION: &str = "webm";

/// A recorded or uploaded call, before it has an artifact path.
#[derive(Debug, Clone)]
pub struct CallUpload {
    pub user_id: String,
    pub title: String,
    pub client_name: String,
    pub duration_secs: u32,
    /// Original file name; only its extension is kept.
    pub file_name: Option<String>,
    pub audio: Vec<u8>,
}

pub struct CallIntake {
    calls: Arc<dyn CallStore>,
    applications: Arc<dyn ApplicationStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl CallIntake {
    pub fn new(
        calls: Arc<dyn CallStore>,
        applications: Arc<dyn ApplicationStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            calls,
            applications,
            artifacts,
        }
    }

    /// Stores the audio, then creates the job in `processing`.
    /// No job exists unless the artifact was durably written.
    pub async fn register_call(&self, upload: CallUpload) -> Result<CallJob> {
        if upload.title.trim().is_empty() {
            return Err(ValidationError::Empty("title").into());
        }
        if upload.client_name.trim().is_empty() {
            return Err(ValidationError::Empty("client_name").into());
        }

        let path = artifact_path(upload.file_name.as_deref());
        validate_path(&path)?;
        self.artifacts.put(&path, &upload.audio).await?;
        debug!(path = %path, bytes = upload.audio.len(), "Stored call audio");

        let call = CallJob::new(NewCall {
            user_id: upload.user_id,
            title: upload.title.trim().to_string(),
            client_name: upload.client_name.trim().to_string(),
            audio_url: self.artifacts.url_for(&path),
            duration_secs: upload.duration_secs,
        });
        self.calls.insert_call(&call)?;
        info!(call_id = %call.id, "Registered call");
        Ok(call)
    }

    /// Creates a fresh job for an errored call, re-using its artifact.
    pub fn retry_call(&self, call_id: &str) -> Result<CallJob> {
        let failed = self.load_call(call_id)?;
        if failed.status != CallStatus::Error {
            return Err(ValidationError::CallState {
                id: failed.id,
                status: failed.status,
                expected: CallStatus::Error,
            }
            .into());
        }

        let call = CallJob::new(NewCall {
            user_id: failed.user_id,
            title: failed.title,
            client_name: failed.client_name,
            audio_url: failed.audio_url,
            duration_secs: failed.duration_secs,
        });
        self.calls.insert_call(&call)?;
        info!(call_id = %call.id, retry_of = %call_id, "Created retry job");
        Ok(call)
    }

    /// Derives a loan application from a completed call. Drafting the same
    /// call twice returns the first draft.
    pub fn draft_application(
        &self,
        call_id: &str,
        contact: ClientContact,
    ) -> Result<LoanApplication> {
        let call = self.load_call(call_id)?;
        if call.status != CallStatus::Completed {
            return Err(ValidationError::CallState {
                id: call.id,
                status: call.status,
                expected: CallStatus::Completed,
            }
            .into());
        }

        if let Some(existing) = self.applications.find_application_for_call(call_id)? {
            debug!(application_id = %existing.id, "Call already has an application");
            return Ok(existing);
        }

        let draft = LoanDraft::from_info(call.loan_info.as_ref());
        let app = LoanApplication::new(NewApplication {
            user_id: call.user_id,
            client_name: call.client_name,
            contact,
            loan_amount: draft.loan_amount,
            loan_type: draft.loan_type,
            property_type: draft.property_type,
            interest_rate: draft.interest_rate,
            term_years: draft.term_years,
            call_id: Some(call.id),
            status: draft.status,
        })?;
        self.applications.insert_application(&app)?;
        info!(application_id = %app.id, status = %app.status, "Drafted application");
        Ok(app)
    }

    fn load_call(&self, call_id: &str) -> Result<CallJob> {
        self.calls
            .find_call(call_id)?
            .ok_or_else(|| PipelineError::JobNotFound(call_id.to_string()).into())
    }
}

/// Loan fields resolved against the dashboard defaults.
struct LoanDraft {
    loan_amount: f64,
    loan_type: String,
    property_type: String,
    interest_rate: f64,
    term_years: u32,
    status: ApplicationStatus,
}

impl LoanDraft {
    fn from_info(info: Option<&LoanInfo>) -> Self {
        let info = info.cloned().unwrap_or_default();
        // Values that cannot go into an LOS submission count as undetermined.
        let usable = LoanInfo {
            loan_amount: info.loan_amount.filter(|a| a.is_finite() && *a > 0.0),
            loan_type: non_blank(info.loan_type),
            property_type: non_blank(info.property_type),
            rate: info.rate.filter(|r| r.is_finite() && *r >= 0.0),
            term: info.term.filter(|t| *t > 0),
        };
        let status = if usable.is_complete() {
            ApplicationStatus::ReadyForLos
        } else {
            ApplicationStatus::ReviewNeeded
        };

        Self {
            loan_amount: usable.loan_amount.unwrap_or(DEFAULT_LOAN_AMOUNT),
            loan_type: usable
                .loan_type
                .unwrap_or_else(|| DEFAULT_LOAN_TYPE.to_string()),
            property_type: usable
                .property_type
                .unwrap_or_else(|| DEFAULT_PROPERTY_TYPE.to_string()),
            interest_rate: usable.rate.unwrap_or(DEFAULT_INTEREST_RATE),
            term_years: usable.term.unwrap_or(DEFAULT_TERM_YEARS),
            status,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `calls/<millis>-<8 hex>.<ext>`
fn artifact_path(file_name: Option<&str>) -> String {
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_AUDIO_EXTENSION.to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "calls/{}-{}.{}",
        Utc::now().timestamp_millis(),
        &suffix[..8],
        extension
    )
}
