use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::{CallAnalysis, LoanInfo};
use super::UnknownVariant;
use crate::error::ErrorKind;

/// Lifecycle of a call job. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Processing,
    Completed,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Processing => "processing",
            CallStatus::Completed => "completed",
            CallStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Processing)
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(CallStatus::Processing),
            "completed" => Ok(CallStatus::Completed),
            "error" => Ok(CallStatus::Error),
            other => Err(UnknownVariant::new("call status", other)),
        }
    }
}

/// One uploaded call and everything the pipeline derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallJob {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub client_name: String,
    /// Artifact reference (URL or store path) of the recorded audio.
    pub audio_url: String,
    pub duration_secs: u32,
    pub status: CallStatus,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub action_items: Option<Vec<String>>,
    pub loan_info: Option<LoanInfo>,
    /// Human-readable failure cause; only set with `status = error`.
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CallJob {
    /// Builds a fresh job in `processing` with no derived fields.
    pub fn new(call: NewCall) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: call.user_id,
            title: call.title,
            client_name: call.client_name,
            audio_url: call.audio_url,
            duration_secs: call.duration_secs,
            status: CallStatus::Processing,
            transcript: None,
            summary: None,
            key_points: None,
            action_items: None,
            loan_info: None,
            error: None,
            error_kind: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The structured analysis, when the job completed.
    pub fn analysis(&self) -> Option<CallAnalysis> {
        if self.status != CallStatus::Completed {
            return None;
        }
        Some(CallAnalysis {
            summary: self.summary.clone(),
            key_points: self.key_points.clone(),
            action_items: self.action_items.clone(),
            loan_info: self.loan_info.clone(),
        })
    }

    /// True when a transcript exists but the structured analysis does not,
    /// so the dashboard shows the raw transcript with "analysis unavailable".
    pub fn analysis_unavailable(&self) -> bool {
        self.status == CallStatus::Error && self.transcript.is_some()
    }
}

/// Input for creating a call job once its audio is durably stored.
#[derive(Debug, Clone)]
pub struct NewCall {
    pub user_id: String,
    pub title: String,
    pub client_name: String,
    pub audio_url: String,
    pub duration_secs: u32,
}
