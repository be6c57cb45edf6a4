//! Domain records: call jobs, loan applications and subscriptions.
//!
//! Every status the dashboard reads is a closed enum here; the database layer
//! stores their canonical strings and refuses anything else on read.

use thiserror::Error;

pub mod analysis;
pub mod application;
pub mod call;
pub mod subscription;

pub use analysis::{CallAnalysis, LoanInfo};
pub use application::{ApplicationStatus, ClientContact, LoanApplication, NewApplication};
pub use call::{CallJob, CallStatus, NewCall};
pub use subscription::{Plan, Subscription, SubscriptionStatus};

/// A persisted string that does not name any variant of a closed enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {what} '{value}'")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

/// Rejected field values on records created by the core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Loan amount must be positive, got {0}")]
    LoanAmount(f64),

    #[error("Interest rate must be non-negative, got {0}")]
    InterestRate(f64),

    #[error("Term must be a positive number of years")]
    Term,

    #[error("Field '{0}' must not be empty")]
    Empty(&'static str),

    #[error("Applications reach 'Pushed to Encompass' only through the LOS push")]
    PushedOnCreate,

    #[error("Call '{id}' is {status}, expected {expected}")]
    CallState {
        id: String,
        status: CallStatus,
        expected: CallStatus,
    },
}
