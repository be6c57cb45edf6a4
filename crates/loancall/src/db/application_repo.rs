//! Loan application repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::columns::{parsed, time, timestamp};
use super::{Database, DatabaseError};
use crate::model::LoanApplication;

fn application_from_row(row: &Row<'_>) -> Result<LoanApplication, rusqlite::Error> {
    Ok(LoanApplication {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        client_name: row.get("client_name")?,
        client_email: row.get("client_email")?,
        client_phone: row.get("client_phone")?,
        loan_amount: row.get("loan_amount")?,
        loan_type: row.get("loan_type")?,
        property_type: row.get("property_type")?,
        interest_rate: row.get("interest_rate")?,
        term_years: row.get("term_years")?,
        call_id: row.get("call_id")?,
        status: parsed(row, "status")?,
        encompass_id: row.get("encompass_id")?,
        created_at: time(row, "created_at")?,
        updated_at: time(row, "updated_at")?,
    })
}

pub fn insert(db: &Database, app: &LoanApplication) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO loan_applications (id, user_id, client_name, client_email, client_phone,
             loan_amount, loan_type, property_type, interest_rate, term_years, call_id, status,
             encompass_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                app.id,
                app.user_id,
                app.client_name,
                app.client_email,
                app.client_phone,
                app.loan_amount,
                app.loan_type,
                app.property_type,
                app.interest_rate,
                app.term_years,
                app.call_id,
                app.status.as_str(),
                app.encompass_id,
                timestamp(&app.created_at),
                timestamp(&app.updated_at),
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<LoanApplication>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM loan_applications WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], application_from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds the most recent application drafted from a call.
pub fn find_by_call(db: &Database, call_id: &str) -> Result<Option<LoanApplication>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM loan_applications WHERE call_id = ?1 ORDER BY created_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![call_id], application_from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Takes the push lease for `token`. Fails while an ID is stored or another
/// push holds a lease taken at or after `lease_cutoff`.
pub fn claim_push(
    db: &Database,
    id: &str,
    token: &str,
    now: &DateTime<Utc>,
    lease_cutoff: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE loan_applications
             SET push_claim_token = ?2, push_claimed_at = ?3
             WHERE id = ?1 AND encompass_id IS NULL
               AND (push_claim_token IS NULL OR push_claimed_at < ?4)",
            params![id, token, timestamp(now), timestamp(lease_cutoff)],
        )?;
        Ok(rows == 1)
    })
}

/// Drops the push lease if `token` still holds it.
pub fn release_push(db: &Database, id: &str, token: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE loan_applications SET push_claim_token = NULL, push_claimed_at = NULL
             WHERE id = ?1 AND push_claim_token = ?2",
            params![id, token],
        )?;
        Ok(rows == 1)
    })
}

/// Records the LOS loan ID under the push lease held by `token`.
/// Returns `false` when the lease was lost or an ID is already stored.
pub fn mark_pushed(
    db: &Database,
    id: &str,
    token: &str,
    encompass_id: &str,
    at: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE loan_applications
             SET status = 'Pushed to Encompass', encompass_id = ?3, updated_at = ?4,
                 push_claim_token = NULL, push_claimed_at = NULL
             WHERE id = ?1 AND push_claim_token = ?2 AND encompass_id IS NULL",
            params![id, token, encompass_id, timestamp(at)],
        )?;
        Ok(rows == 1)
    })
}
