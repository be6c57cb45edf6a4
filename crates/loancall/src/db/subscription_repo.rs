//! Subscription repository.
//!
//! Provider-managed rows are keyed by `stripe_subscription_id`; rows created
//! through self-service have no provider ID.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::columns::{parsed, time, timestamp};
use super::{Database, DatabaseError};
use crate::model::{Plan, Subscription, SubscriptionStatus};

fn subscription_from_row(row: &Row<'_>) -> Result<Subscription, rusqlite::Error> {
    Ok(Subscription {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        plan: parsed(row, "plan_id")?,
        status: parsed(row, "status")?,
        stripe_subscription_id: row.get("stripe_subscription_id")?,
        stripe_customer_id: row.get("stripe_customer_id")?,
        created_at: time(row, "created_at")?,
        updated_at: time(row, "updated_at")?,
    })
}

/// Provider-side subscription state to mirror locally.
#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
    pub user_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub at: DateTime<Utc>,
}

/// Inserts or updates by provider subscription ID. `created_at` is kept on update.
pub fn upsert_from_provider(db: &Database, sub: &SubscriptionUpsert) -> Result<(), DatabaseError> {
    let at = timestamp(&sub.at);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO subscriptions (id, user_id, plan_id, status, stripe_subscription_id,
             stripe_customer_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(stripe_subscription_id) DO UPDATE SET
                user_id = excluded.user_id,
                plan_id = excluded.plan_id,
                status = excluded.status,
                stripe_customer_id = excluded.stripe_customer_id,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                sub.user_id,
                sub.plan.as_str(),
                sub.status.as_str(),
                sub.stripe_subscription_id,
                sub.stripe_customer_id,
                at,
            ],
        )?;
        Ok(())
    })
}

/// Marks a provider subscription canceled. Returns `false` if no row matched.
pub fn cancel_by_provider_id(
    db: &Database,
    stripe_subscription_id: &str,
    at: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE subscriptions SET status = 'canceled', updated_at = ?2
             WHERE stripe_subscription_id = ?1",
            params![stripe_subscription_id, timestamp(at)],
        )?;
        Ok(rows > 0)
    })
}

pub fn find_by_provider_id(
    db: &Database,
    stripe_subscription_id: &str,
) -> Result<Option<Subscription>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM subscriptions WHERE stripe_subscription_id = ?1",
                params![stripe_subscription_id],
                subscription_from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// The user's current active subscription, most recently updated first.
pub fn find_active_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Option<Subscription>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM subscriptions WHERE user_id = ?1 AND status = 'active'
                 ORDER BY updated_at DESC LIMIT 1",
                params![user_id],
                subscription_from_row,
            )
            .optional()?;
        Ok(row)
    })
}

pub fn active_plan_for_user(db: &Database, user_id: &str) -> Result<Option<Plan>, DatabaseError> {
    Ok(find_active_for_user(db, user_id)?.map(|sub| sub.plan))
}

/// Self-service plan change: updates the user's locally-managed row,
/// or creates one when the user has none.
pub fn subscribe_user(
    db: &Database,
    user_id: &str,
    plan: Plan,
    at: &DateTime<Utc>,
) -> Result<Subscription, DatabaseError> {
    let at = timestamp(at);
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE subscriptions SET plan_id = ?2, status = 'active', updated_at = ?3
             WHERE user_id = ?1 AND stripe_subscription_id IS NULL",
            params![user_id, plan.as_str(), at],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO subscriptions (id, user_id, plan_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'active', ?4, ?4)",
                params![uuid::Uuid::new_v4().to_string(), user_id, plan.as_str(), at],
            )?;
        }
        let sub = conn.query_row(
            "SELECT * FROM subscriptions WHERE user_id = ?1 AND stripe_subscription_id IS NULL
             ORDER BY updated_at DESC LIMIT 1",
            params![user_id],
            subscription_from_row,
        )?;
        Ok(sub)
    })
}

/// Cancels every active subscription the user holds. Returns the number changed.
pub fn cancel_for_user(
    db: &Database,
    user_id: &str,
    at: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE subscriptions SET status = 'canceled', updated_at = ?2
             WHERE user_id = ?1 AND status = 'active'",
            params![user_id, timestamp(at)],
        )?;
        Ok(rows)
    })
}

/// Associates a provider customer with a local user. Later links win.
pub fn link_customer(
    db: &Database,
    stripe_customer_id: &str,
    user_id: &str,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO billing_customers (stripe_customer_id, user_id, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(stripe_customer_id) DO UPDATE SET user_id = excluded.user_id",
            params![stripe_customer_id, user_id, timestamp(at)],
        )?;
        Ok(())
    })
}

pub fn user_for_customer(
    db: &Database,
    stripe_customer_id: &str,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let user = conn
            .query_row(
                "SELECT user_id FROM billing_customers WHERE stripe_customer_id = ?1",
                params![stripe_customer_id],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(user)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn upsert(plan: Plan, status: SubscriptionStatus, at: DateTime<Utc>) -> SubscriptionUpsert {
        SubscriptionUpsert {
            user_id: "u1".to_string(),
            plan,
            status,
            stripe_subscription_id: "sub_1".to_string(),
            stripe_customer_id: "cus_1".to_string(),
            at,
        }
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let db = test_db();
        let t0 = Utc::now();
        upsert_from_provider(&db, &upsert(Plan::Starter, SubscriptionStatus::Trialing, t0)).unwrap();
        let t1 = t0 + Duration::minutes(5);
        upsert_from_provider(&db, &upsert(Plan::Professional, SubscriptionStatus::Active, t1))
            .unwrap();

        let sub = find_by_provider_id(&db, "sub_1").unwrap().unwrap();
        assert_eq!(sub.plan, Plan::Professional);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.created_at < sub.updated_at);

        let count: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM subscriptions", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cancel_by_provider_id() {
        let db = test_db();
        let now = Utc::now();
        assert!(!cancel_by_provider_id(&db, "sub_1", &now).unwrap());

        upsert_from_provider(&db, &upsert(Plan::Starter, SubscriptionStatus::Active, now)).unwrap();
        assert!(cancel_by_provider_id(&db, "sub_1", &now).unwrap());
        let sub = find_by_provider_id(&db, "sub_1").unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert!(find_active_for_user(&db, "u1").unwrap().is_none());
    }

    #[test]
    fn test_self_service_subscribe_and_cancel() {
        let db = test_db();
        let now = Utc::now();
        let sub = subscribe_user(&db, "u2", Plan::Starter, &now).unwrap();
        assert!(sub.is_active());
        assert!(sub.stripe_subscription_id.is_none());

        let later = now + Duration::seconds(1);
        let changed = subscribe_user(&db, "u2", Plan::Enterprise, &later).unwrap();
        assert_eq!(changed.id, sub.id);
        assert_eq!(changed.plan, Plan::Enterprise);
        assert_eq!(active_plan_for_user(&db, "u2").unwrap(), Some(Plan::Enterprise));

        assert_eq!(cancel_for_user(&db, "u2", &later).unwrap(), 1);
        assert!(find_active_for_user(&db, "u2").unwrap().is_none());
        assert_eq!(active_plan_for_user(&db, "u2").unwrap(), None);
    }

    #[test]
    fn test_customer_links() {
        let db = test_db();
        let now = Utc::now();
        assert!(user_for_customer(&db, "cus_1").unwrap().is_none());
        link_customer(&db, "cus_1", "u1", &now).unwrap();
        link_customer(&db, "cus_1", "u9", &now).unwrap();
        assert_eq!(user_for_customer(&db, "cus_1").unwrap().as_deref(), Some("u9"));
    }
}
