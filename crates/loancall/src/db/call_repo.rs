//! Call repository: CRUD and lease operations for the `calls` table.
//!
//! Writes that move a call out of `processing` are fenced on the claim
//! token, so only the run holding the current lease can commit.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::columns::{encode_json, json_opt, parsed, parsed_opt, time, time_opt, timestamp};
use super::{Database, DatabaseError};
use crate::error::ErrorKind;
use crate::model::{CallAnalysis, CallJob};

fn call_from_row(row: &Row<'_>) -> Result<CallJob, rusqlite::Error> {
    Ok(CallJob {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        client_name: row.get("client_name")?,
        audio_url: row.get("audio_url")?,
        duration_secs: row.get("duration")?,
        status: parsed(row, "status")?,
        transcript: row.get("transcript")?,
        summary: row.get("summary")?,
        key_points: json_opt(row, "key_points")?,
        action_items: json_opt(row, "action_items")?,
        loan_info: json_opt(row, "loan_info")?,
        error: row.get("error")?,
        error_kind: parsed_opt(row, "error_kind")?,
        created_at: time(row, "created_at")?,
        updated_at: time(row, "updated_at")?,
        completed_at: time_opt(row, "completed_at")?,
    })
}

/// Inserts a new call row. Claim columns start empty.
pub fn insert(db: &Database, call: &CallJob) -> Result<(), DatabaseError> {
    let key_points = encode_json("key_points", call.key_points.as_ref())?;
    let action_items = encode_json("action_items", call.action_items.as_ref())?;
    let loan_info = encode_json("loan_info", call.loan_info.as_ref())?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO calls (id, user_id, title, client_name, audio_url, duration, status,
             transcript, summary, key_points, action_items, loan_info, error, error_kind,
             created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                call.id,
                call.user_id,
                call.title,
                call.client_name,
                call.audio_url,
                call.duration_secs,
                call.status.as_str(),
                call.transcript,
                call.summary,
                key_points,
                action_items,
                loan_info,
                call.error,
                call.error_kind.map(|k| k.as_str()),
                timestamp(&call.created_at),
                timestamp(&call.updated_at),
                call.completed_at.as_ref().map(timestamp),
            ],
        )?;
        Ok(())
    })
}

/// Finds a call by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<CallJob>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM calls WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], call_from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Takes the processing lease on a call.
///
/// Succeeds only while the call is `processing` and either unclaimed or
/// claimed before `lease_cutoff`. Returns whether this caller now holds it.
pub fn claim(
    db: &Database,
    id: &str,
    token: &str,
    now: &DateTime<Utc>,
    lease_cutoff: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE calls SET claim_token = ?2, claimed_at = ?3
             WHERE id = ?1 AND status = 'processing'
               AND (claim_token IS NULL OR claimed_at < ?4)",
            params![id, token, timestamp(now), timestamp(lease_cutoff)],
        )?;
        Ok(rows == 1)
    })
}

/// Commits a successful run: transcript plus every analysis field, in one row update.
pub fn complete(
    db: &Database,
    id: &str,
    token: &str,
    transcript: &str,
    analysis: &CallAnalysis,
    at: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let key_points = encode_json("key_points", analysis.key_points.as_ref())?;
    let action_items = encode_json("action_items", analysis.action_items.as_ref())?;
    let loan_info = encode_json("loan_info", analysis.loan_info.as_ref())?;
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE calls SET status = 'completed', transcript = ?3, summary = ?4,
             key_points = ?5, action_items = ?6, loan_info = ?7, error = NULL,
             error_kind = NULL, updated_at = ?8, completed_at = ?8
             WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
            params![
                id,
                token,
                transcript,
                analysis.summary,
                key_points,
                action_items,
                loan_info,
                timestamp(at),
            ],
        )?;
        Ok(rows == 1)
    })
}

/// Commits a failed run. Analysis fields stay null; a transcript obtained
/// before the failure is kept.
pub fn fail(
    db: &Database,
    id: &str,
    token: &str,
    transcript: Option<&str>,
    kind: ErrorKind,
    cause: &str,
    at: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let rows = conn.execute(
            "UPDATE calls SET status = 'error', transcript = ?3, error = ?4, error_kind = ?5,
             updated_at = ?6, completed_at = ?6
             WHERE id = ?1 AND status = 'processing' AND claim_token = ?2",
            params![id, token, transcript, cause, kind.as_str(), timestamp(at)],
        )?;
        Ok(rows == 1)
    })
}

/// Returns IDs of `processing` calls with no live lease as of `cutoff`:
/// never claimed and created before it, or claimed before it.
pub fn find_stalled(db: &Database, cutoff: &DateTime<Utc>) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id FROM calls
             WHERE status = 'processing'
               AND ((claim_token IS NULL AND created_at < ?1)
                    OR (claim_token IS NOT NULL AND claimed_at < ?1))
             ORDER BY created_at ASC",
        )?;
        let ids = stmt
            .query_map(params![timestamp(cutoff)], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallStatus, LoanInfo, NewCall};
    use chrono::Duration;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_call(user: &str) -> CallJob {
        CallJob::new(NewCall {
            user_id: user.to_string(),
            title: "Intro call".to_string(),
            client_name: "Dana Whitfield".to_string(),
            audio_url: "calls/1700000000000.wav".to_string(),
            duration_secs: 312,
        })
    }

    fn sample_analysis() -> CallAnalysis {
        CallAnalysis {
            summary: Some("Client wants a 30-year FHA loan.".to_string()),
            key_points: Some(vec!["FHA".to_string(), "30 years".to_string()]),
            action_items: Some(vec!["Send rate sheet".to_string()]),
            loan_info: Some(LoanInfo {
                loan_type: Some("FHA".to_string()),
                loan_amount: Some(450_000.0),
                property_type: None,
                rate: None,
                term: Some(30),
            }),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let call = sample_call("u1");
        insert(&db, &call).unwrap();

        let found = find_by_id(&db, &call.id).unwrap().unwrap();
        assert_eq!(found.id, call.id);
        assert_eq!(found.status, CallStatus::Processing);
        assert_eq!(found.duration_secs, 312);
        assert!(found.transcript.is_none());
        assert!(found.completed_at.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_claim_is_exclusive_until_lease_expires() {
        let db = test_db();
        let call = sample_call("u1");
        insert(&db, &call).unwrap();
        let now = Utc::now();
        let lease = Duration::minutes(15);

        assert!(claim(&db, &call.id, "run-a", &now, &(now - lease)).unwrap());
        assert!(!claim(&db, &call.id, "run-b", &now, &(now - lease)).unwrap());

        let later = now + Duration::minutes(16);
        assert!(claim(&db, &call.id, "run-b", &later, &(later - lease)).unwrap());
    }

    #[test]
    fn test_complete_is_fenced_on_token() {
        let db = test_db();
        let call = sample_call("u1");
        insert(&db, &call).unwrap();
        let now = Utc::now();
        claim(&db, &call.id, "run-a", &now, &(now - Duration::minutes(15))).unwrap();

        let analysis = sample_analysis();
        assert!(!complete(&db, &call.id, "stale", "hello", &analysis, &now).unwrap());
        assert!(complete(&db, &call.id, "run-a", "hello", &analysis, &now).unwrap());

        let found = find_by_id(&db, &call.id).unwrap().unwrap();
        assert_eq!(found.status, CallStatus::Completed);
        assert_eq!(found.transcript.as_deref(), Some("hello"));
        assert_eq!(found.analysis(), Some(analysis));
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_terminal_call_cannot_be_claimed_or_committed() {
        let db = test_db();
        let call = sample_call("u1");
        insert(&db, &call).unwrap();
        let now = Utc::now();
        let cutoff = now - Duration::minutes(15);
        claim(&db, &call.id, "run-a", &now, &cutoff).unwrap();
        assert!(fail(
            &db,
            &call.id,
            "run-a",
            None,
            ErrorKind::ArtifactUnavailable,
            "404",
            &now
        )
        .unwrap());

        let far = now + Duration::hours(2);
        assert!(!claim(&db, &call.id, "run-b", &far, &(far - Duration::minutes(15))).unwrap());
        assert!(!complete(&db, &call.id, "run-a", "late", &sample_analysis(), &far).unwrap());

        let found = find_by_id(&db, &call.id).unwrap().unwrap();
        assert_eq!(found.status, CallStatus::Error);
        assert_eq!(found.error_kind, Some(ErrorKind::ArtifactUnavailable));
        assert_eq!(found.error.as_deref(), Some("404"));
        assert!(found.transcript.is_none());
    }

    #[test]
    fn test_fail_keeps_transcript() {
        let db = test_db();
        let call = sample_call("u1");
        insert(&db, &call).unwrap();
        let now = Utc::now();
        claim(&db, &call.id, "t", &now, &(now - Duration::minutes(15))).unwrap();
        fail(
            &db,
            &call.id,
            "t",
            Some("raw words"),
            ErrorKind::ExtractionMalformed,
            "not json",
            &now,
        )
        .unwrap();

        let found = find_by_id(&db, &call.id).unwrap().unwrap();
        assert!(found.analysis_unavailable());
        assert!(found.summary.is_none());
        assert!(found.loan_info.is_none());
    }

    #[test]
    fn test_find_stalled() {
        let db = test_db();
        let fresh = sample_call("u1");
        let claimed = sample_call("u1");
        insert(&db, &fresh).unwrap();
        insert(&db, &claimed).unwrap();
        let now = Utc::now();
        claim(&db, &claimed.id, "t", &now, &(now - Duration::minutes(15))).unwrap();

        // Nothing is older than a cutoff in the past.
        assert!(find_stalled(&db, &(now - Duration::hours(1))).unwrap().is_empty());

        let stalled = find_stalled(&db, &(now + Duration::hours(1))).unwrap();
        assert_eq!(stalled.len(), 2);
        assert!(stalled.contains(&fresh.id));
        assert!(stalled.contains(&claimed.id));
    }
}
