//! Store traits the orchestrators depend on, implemented for [`Database`].
//!
//! The orchestrators only ever see these traits, so tests can substitute a
//! store that fails or races without touching SQLite.

use chrono::{DateTime, Utc};

use super::{application_repo, call_repo, subscription_repo, Database, DatabaseError};
use crate::error::ErrorKind;
use crate::model::{CallAnalysis, CallJob, LoanApplication};
use subscription_repo::SubscriptionUpsert;

/// A lease request for a call run or an LOS push.
#[derive(Debug, Clone)]
pub struct Lease {
    pub token: String,
    pub now: DateTime<Utc>,
    /// Leases taken before this instant are considered abandoned.
    pub lease_cutoff: DateTime<Utc>,
}

/// The single write that takes a call out of `processing`.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalUpdate {
    Completed {
        transcript: String,
        analysis: CallAnalysis,
    },
    Failed {
        transcript: Option<String>,
        kind: ErrorKind,
        cause: String,
    },
}

pub trait CallStore: Send + Sync {
    fn insert_call(&self, call: &CallJob) -> Result<(), DatabaseError>;

    fn find_call(&self, id: &str) -> Result<Option<CallJob>, DatabaseError>;

    /// Returns whether the lease was taken.
    fn claim_call(&self, id: &str, claim: &Lease) -> Result<bool, DatabaseError>;

    /// Applies `update` if `token` still holds the lease. Returns whether it did.
    fn commit_call(
        &self,
        id: &str,
        token: &str,
        update: &TerminalUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    fn stalled_calls(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, DatabaseError>;
}

pub trait ApplicationStore: Send + Sync {
    fn insert_application(&self, app: &LoanApplication) -> Result<(), DatabaseError>;

    fn find_application(&self, id: &str) -> Result<Option<LoanApplication>, DatabaseError>;

    fn find_application_for_call(
        &self,
        call_id: &str,
    ) -> Result<Option<LoanApplication>, DatabaseError>;

    /// Returns whether the push lease was taken.
    fn claim_push(&self, id: &str, lease: &Lease) -> Result<bool, DatabaseError>;

    fn release_push(&self, id: &str, token: &str) -> Result<(), DatabaseError>;

    /// Records the LOS ID if `token` still holds the push lease and no ID is
    /// stored yet. Returns whether it did.
    fn mark_pushed(
        &self,
        id: &str,
        token: &str,
        encompass_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;
}

pub trait SubscriptionStore: Send + Sync {
    fn upsert_subscription(&self, sub: &SubscriptionUpsert) -> Result<(), DatabaseError>;

    /// Returns `false` when no subscription has that provider ID.
    fn cancel_subscription(
        &self,
        stripe_subscription_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    fn user_for_customer(&self, stripe_customer_id: &str) -> Result<Option<String>, DatabaseError>;
}

impl CallStore for Database {
    fn insert_call(&self, call: &CallJob) -> Result<(), DatabaseError> {
        call_repo::insert(self, call)
    }

    fn find_call(&self, id: &str) -> Result<Option<CallJob>, DatabaseError> {
        call_repo::find_by_id(self, id)
    }

    fn claim_call(&self, id: &str, claim: &Lease) -> Result<bool, DatabaseError> {
        call_repo::claim(self, id, &claim.token, &claim.now, &claim.lease_cutoff)
    }

    fn commit_call(
        &self,
        id: &str,
        token: &str,
        update: &TerminalUpdate,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        match update {
            TerminalUpdate::Completed {
                transcript,
                analysis,
            } => call_repo::complete(self, id, token, transcript, analysis, &at),
            TerminalUpdate::Failed {
                transcript,
                kind,
                cause,
            } => call_repo::fail(self, id, token, transcript.as_deref(), *kind, cause, &at),
        }
    }

    fn stalled_calls(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, DatabaseError> {
        call_repo::find_stalled(self, &cutoff)
    }
}

impl ApplicationStore for Database {
    fn insert_application(&self, app: &LoanApplication) -> Result<(), DatabaseError> {
        application_repo::insert(self, app)
    }

    fn find_application(&self, id: &str) -> Result<Option<LoanApplication>, DatabaseError> {
        application_repo::find_by_id(self, id)
    }

    fn find_application_for_call(
        &self,
        call_id: &str,
    ) -> Result<Option<LoanApplication>, DatabaseError> {
        application_repo::find_by_call(self, call_id)
    }

    fn claim_push(&self, id: &str, lease: &Lease) -> Result<bool, DatabaseError> {
        application_repo::claim_push(self, id, &lease.token, &lease.now, &lease.lease_cutoff)
    }

    fn release_push(&self, id: &str, token: &str) -> Result<(), DatabaseError> {
        application_repo::release_push(self, id, token).map(|_| ())
    }

    fn mark_pushed(
        &self,
        id: &str,
        token: &str,
        encompass_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        application_repo::mark_pushed(self, id, token, encompass_id, &at)
    }
}

impl SubscriptionStore for Database {
    fn upsert_subscription(&self, sub: &SubscriptionUpsert) -> Result<(), DatabaseError> {
        subscription_repo::upsert_from_provider(self, sub)
    }

    fn cancel_subscription(
        &self,
        stripe_subscription_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        subscription_repo::cancel_by_provider_id(self, stripe_subscription_id, &at)
    }

    fn user_for_customer(&self, stripe_customer_id: &str) -> Result<Option<String>, DatabaseError> {
        subscription_repo::user_for_customer(self, stripe_customer_id)
    }
}
