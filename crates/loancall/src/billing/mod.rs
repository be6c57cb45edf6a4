//! Payment-provider webhooks reconciled into local subscription state.

pub mod event;
pub mod plans;
pub mod signature;
pub mod webhook;

pub use event::{EventKind, ProviderSubscription, WebhookEvent};
pub use plans::PlanTable;
pub use signature::{compute_signature, signature_header, SignatureError, SignatureVerifier};
pub use webhook::{BillingWebhook, WebhookError, WebhookOutcome};
