use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use super::client::{LosClient, LosError};
use super::payload::LoanPayload;
use crate::db::{ApplicationStore, DatabaseError, Lease};
use crate::error::ErrorKind;

/// Slack added to the push timeout to form the push lease. A holder that
/// has not recorded an ID or released within the lease is presumed dead.
const PUSH_LEASE_MARGIN: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Application not found: {0}")]
    ApplicationNotFound(String),

    #[error("Push already in progress for application {0}")]
    InFlight(String),

    #[error("LOS push failed: {0}")]
    Los(#[from] LosError),

    #[error("LOS push timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

impl PushError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::ApplicationNotFound(_) => ErrorKind::JobNotFound,
            PushError::InFlight(_) | PushError::Los(_) | PushError::TimedOut { .. } => {
                ErrorKind::PushFailed
            }
            PushError::Store(_) => ErrorKind::StoreUnavailable,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, PushError::InFlight(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub encompass_id: String,
    /// True when the ID came from an earlier push rather than this one.
    pub already_pushed: bool,
}

impl PushOutcome {
    fn stored(encompass_id: String) -> Self {
        Self {
            encompass_id,
            already_pushed: true,
        }
    }
}

/// Pushes applications to the LOS at most once each.
///
/// A push takes a lease on the application before calling the LOS, so
/// overlapping pushes of one application make a single LOS request.
pub struct LosPusher {
    applications: Arc<dyn ApplicationStore>,
    client: Arc<dyn LosClient>,
    timeout: Duration,
    lease: Duration,
}

impl LosPusher {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        client: Arc<dyn LosClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            applications,
            client,
            timeout,
            lease: timeout + PUSH_LEASE_MARGIN,
        }
    }

    /// Pushes the application, or returns the stored LOS ID if it was
    /// already pushed. On failure the application is left unmodified.
    pub async fn push(&self, application_id: &str) -> Result<PushOutcome, PushError> {
        let span = info_span!("los_push", application_id = %application_id, los = self.client.name());
        self.push_once(application_id).instrument(span).await
    }

    async fn push_once(&self, application_id: &str) -> Result<PushOutcome, PushError> {
        let app = self
            .applications
            .find_application(application_id)?
            .ok_or_else(|| PushError::ApplicationNotFound(application_id.to_string()))?;

        if let Some(encompass_id) = app.encompass_id {
            info!(encompass_id = %encompass_id, "Application already pushed");
            return Ok(PushOutcome::stored(encompass_id));
        }

        let now = Utc::now();
        let lease_len =
            chrono::Duration::from_std(self.lease).unwrap_or_else(|_| chrono::Duration::days(365));
        let lease = Lease {
            token: uuid::Uuid::new_v4().to_string(),
            now,
            lease_cutoff: now - lease_len,
        };
        if !self.applications.claim_push(application_id, &lease)? {
            debug!("Push lease held elsewhere");
            return self.current(application_id);
        }

        let payload = LoanPayload::from_application(&app);
        let created = match tokio::time::timeout(self.timeout, self.client.create_loan(&payload)).await {
            Ok(result) => result.map_err(PushError::from),
            Err(_) => Err(PushError::TimedOut {
                secs: self.timeout.as_secs(),
            }),
        };
        let encompass_id = match created {
            Ok(id) => id,
            Err(e) => {
                let released = self.applications.release_push(application_id, &lease.token);
                if let Err(release) = released {
                    warn!(error = %release, "Failed to release push lease");
                }
                return Err(e);
            }
        };

        if self
            .applications
            .mark_pushed(application_id, &lease.token, &encompass_id, Utc::now())?
        {
            info!(encompass_id = %encompass_id, "Application pushed");
            return Ok(PushOutcome {
                encompass_id,
                already_pushed: false,
            });
        }

        // Our lease expired and another push took over before we recorded.
        warn!(discarded = %encompass_id, "Push lease lost before the LOS ID was recorded");
        self.current(application_id)
    }

    /// The stored LOS ID, or `InFlight` while another push holds the lease.
    fn current(&self, application_id: &str) -> Result<PushOutcome, PushError> {
        let app = self
            .applications
            .find_application(application_id)?
            .ok_or_else(|| PushError::ApplicationNotFound(application_id.to_string()))?;
        match app.encompass_id {
            Some(encompass_id) => Ok(PushOutcome::stored(encompass_id)),
            None => Err(PushError::InFlight(application_id.to_string())),
        }
    }
}
