use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use super::event::{EventKind, ProviderSubscription, WebhookEvent};
use super::plans::PlanTable;
use super::signature::{SignatureError, SignatureVerifier};
use crate::config::BillingConfig;
use crate::db::{DatabaseError, SubscriptionStore, SubscriptionUpsert};
use crate::error::{ConfigError, ErrorKind};
use crate::model::{Plan, SubscriptionStatus};
use crate::secrets::resolve_secret_optional;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Missing Stripe signature")]
    MissingSignature,

    #[error("Webhook signing secret is not configured")]
    SecretNotConfigured,

    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}

impl WebhookError {
    /// `None` for failures outside the call and push taxonomy.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature(_) => {
                Some(ErrorKind::InvalidSignature)
            }
            WebhookError::Store(_) => Some(ErrorKind::StoreUnavailable),
            WebhookError::SecretNotConfigured | WebhookError::MalformedEvent(_) => None,
        }
    }
}

/// What a verified event changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    SubscriptionUpserted {
        stripe_subscription_id: String,
        user_id: String,
        plan: Plan,
        status: SubscriptionStatus,
    },
    SubscriptionCanceled {
        stripe_subscription_id: String,
        /// False when no local row had that ID.
        found: bool,
    },
    /// Acknowledged without a write because no local user owns the customer.
    UserUnresolved { stripe_subscription_id: String },
    Ignored { event_type: String },
}

pub struct BillingWebhook {
    verifier: Option<SignatureVerifier>,
    plans: PlanTable,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl BillingWebhook {
    /// A handler without a verifier rejects every event as unconfigured.
    pub fn new(
        verifier: Option<SignatureVerifier>,
        plans: PlanTable,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            verifier,
            plans,
            subscriptions,
        }
    }

    pub fn from_config(
        config: &BillingConfig,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Result<Self, ConfigError> {
        let secret = resolve_secret_optional(
            config.webhook_secret.as_deref(),
            config.webhook_secret_file.as_deref(),
            config.webhook_secret_env.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "billing.webhook_secret",
            source,
        })?;
        if secret.is_none() {
            warn!("No webhook signing secret configured, billing events will be rejected");
        }
        let verifier = secret
            .map(|s| SignatureVerifier::new(s, Duration::from_secs(config.tolerance_secs)));
        Ok(Self::new(
            verifier,
            PlanTable::new(config.price_plans.clone()),
            subscriptions,
        ))
    }

    /// Verifies and applies one event. `body` must be the raw request bytes.
    pub fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;
        let verifier = self
            .verifier
            .as_ref()
            .ok_or(WebhookError::SecretNotConfigured)?;
        verifier.verify(signature, body)?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedEvent(e.to_string()))?;
        let _span = info_span!("billing_event",
            event_id = event.id.as_deref().unwrap_or(""),
            event_type = %event.event_type,
        )
        .entered();

        match event.kind() {
            EventKind::SubscriptionCreated | EventKind::SubscriptionUpdated => {
                self.upsert(read_subscription(&event)?)
            }
            EventKind::SubscriptionDeleted => self.cancel(read_subscription(&event)?),
            EventKind::Other(event_type) => {
                debug!("Ignoring event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    fn upsert(&self, sub: ProviderSubscription) -> Result<WebhookOutcome, WebhookError> {
        let customer = sub
            .customer
            .clone()
            .ok_or_else(|| WebhookError::MalformedEvent("subscription has no customer".into()))?;
        let status = sub
            .status
            .as_deref()
            .ok_or_else(|| WebhookError::MalformedEvent("subscription has no status".into()))?
            .parse::<SubscriptionStatus>()
            .map_err(|e| WebhookError::MalformedEvent(e.to_string()))?;

        let user_id = match self.subscriptions.user_for_customer(&customer)? {
            Some(user_id) => user_id,
            None => match sub.metadata_user_id() {
                Some(user_id) => user_id.to_string(),
                None => {
                    warn!(customer = %customer, subscription = %sub.id, "No user for customer, event acknowledged without update");
                    return Ok(WebhookOutcome::UserUnresolved {
                        stripe_subscription_id: sub.id,
                    });
                }
            },
        };

        let plan = self.plans.plan_for_price(sub.first_price_id());
        self.subscriptions.upsert_subscription(&SubscriptionUpsert {
            user_id: user_id.clone(),
            plan,
            status,
            stripe_subscription_id: sub.id.clone(),
            stripe_customer_id: customer,
            at: Utc::now(),
        })?;
        info!(subscription = %sub.id, plan = %plan, status = %status, "Subscription reconciled");

        Ok(WebhookOutcome::SubscriptionUpserted {
            stripe_subscription_id: sub.id,
            user_id,
            plan,
            status,
        })
    }

    fn cancel(&self, sub: ProviderSubscription) -> Result<WebhookOutcome, WebhookError> {
        let found = self.subscriptions.cancel_subscription(&sub.id, Utc::now())?;
        if found {
            info!(subscription = %sub.id, "Subscription canceled");
        } else {
            warn!(subscription = %sub.id, "Cancel for unknown subscription");
        }
        Ok(WebhookOutcome::SubscriptionCanceled {
            stripe_subscription_id: sub.id,
            found,
        })
    }
}

fn read_subscription(event: &WebhookEvent) -> Result<ProviderSubscription, WebhookError> {
    event
        .subscription()
        .map_err(|e| WebhookError::MalformedEvent(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::signature::signature_header;
    use crate::db::{subscription_repo, Database};
    use secrecy::SecretString;

    const SECRET: &str = "whsec_test";

    fn webhook(db: &Database) -> BillingWebhook {
        BillingWebhook::new(
            Some(SignatureVerifier::new(
                SecretString::from(SECRET),
                Duration::from_secs(300),
            )),
            PlanTable::default(),
            Arc::new(db.clone()),
        )
    }

    fn event(event_type: &str, status: &str, price: &str, metadata: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": {"object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": status,
                "items": {"data": [{"price": {"id": price}}]},
                "metadata": metadata
            }}
        }))
        .unwrap()
    }

    fn signed(body: &[u8]) -> String {
        signature_header(SECRET, Utc::now().timestamp(), body)
    }

    #[test]
    fn test_created_event_upserts_for_linked_customer() {
        let db = Database::open_in_memory().unwrap();
        subscription_repo::link_customer(&db, "cus_1", "u1", &Utc::now()).unwrap();
        let body = event(
            "customer.subscription.created",
            "active",
            "price_professional",
            serde_json::json!({}),
        );

        let outcome = webhook(&db).handle(Some(&signed(&body)), &body).unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::SubscriptionUpserted {
                stripe_subscription_id: "sub_1".to_string(),
                user_id: "u1".to_string(),
                plan: Plan::Professional,
                status: SubscriptionStatus::Active,
            }
        );
        let stored = subscription_repo::find_by_provider_id(&db, "sub_1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.plan, Plan::Professional);
        assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[test]
    fn test_updated_event_falls_back_to_metadata_and_lowest_plan() {
        let db = Database::open_in_memory().unwrap();
        let hook = webhook(&db);
        let body = event(
            "customer.subscription.updated",
            "past_due",
            "price_legacy",
            serde_json::json!({"user_id": "u9"}),
        );

        hook.handle(Some(&signed(&body)), &body).unwrap();

        let stored = subscription_repo::find_by_provider_id(&db, "sub_1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id, "u9");
        assert_eq!(stored.plan, Plan::Starter);
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
    }

    #[test]
    fn test_unresolved_user_is_acknowledged() {
        let db = Database::open_in_memory().unwrap();
        let body = event(
            "customer.subscription.created",
            "active",
            "price_starter",
            serde_json::json!({}),
        );
        let outcome = webhook(&db).handle(Some(&signed(&body)), &body).unwrap();
        assert!(matches!(outcome, WebhookOutcome::UserUnresolved { .. }));
        assert!(subscription_repo::find_by_provider_id(&db, "sub_1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_deleted_event_cancels() {
        let db = Database::open_in_memory().unwrap();
        subscription_repo::link_customer(&db, "cus_1", "u1", &Utc::now()).unwrap();
        let hook = webhook(&db);
        let created = event(
            "customer.subscription.created",
            "active",
            "price_starter",
            serde_json::json!({}),
        );
        hook.handle(Some(&signed(&created)), &created).unwrap();

        let deleted = event(
            "customer.subscription.deleted",
            "canceled",
            "price_starter",
            serde_json::json!({}),
        );
        let outcome = hook.handle(Some(&signed(&deleted)), &deleted).unwrap();

        assert!(matches!(
            outcome,
            WebhookOutcome::SubscriptionCanceled { found: true, .. }
        ));
        let stored = subscription_repo::find_by_provider_id(&db, "sub_1")
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn test_other_events_ignored() {
        let db = Database::open_in_memory().unwrap();
        let body = br#"{"type":"invoice.paid","data":{"object":{"id":"in_1"}}}"#;
        let outcome = webhook(&db).handle(Some(&signed(body)), body).unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "invoice.paid".to_string()
            }
        );
    }

    #[test]
    fn test_signature_failures() {
        let db = Database::open_in_memory().unwrap();
        let hook = webhook(&db);
        let body = event(
            "customer.subscription.created",
            "active",
            "price_starter",
            serde_json::json!({}),
        );

        let err = hook.handle(None, &body).unwrap_err();
        assert!(matches!(err, WebhookError::MissingSignature));

        let other_body = event(
            "customer.subscription.created",
            "active",
            "price_enterprise",
            serde_json::json!({}),
        );
        let err = hook.handle(Some(&signed(&other_body)), &body).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(SignatureError::Mismatch)));
        assert_eq!(err.kind(), Some(ErrorKind::InvalidSignature));
    }

    #[test]
    fn test_unconfigured_secret() {
        let db = Database::open_in_memory().unwrap();
        let hook = BillingWebhook::new(None, PlanTable::default(), Arc::new(db));
        let err = hook.handle(Some("t=1,v1=00"), b"{}").unwrap_err();
        assert!(matches!(err, WebhookError::SecretNotConfigured));
    }

    #[test]
    fn test_malformed_events() {
        let db = Database::open_in_memory().unwrap();
        let hook = webhook(&db);

        let body = b"not json";
        let err = hook.handle(Some(&signed(body)), body).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedEvent(_)));

        let body = event(
            "customer.subscription.created",
            "mystery_state",
            "price_starter",
            serde_json::json!({"user_id": "u1"}),
        );
        let err = hook.handle(Some(&signed(&body)), &body).unwrap_err();
        assert!(matches!(err, WebhookError::MalformedEvent(_)));
    }
}
