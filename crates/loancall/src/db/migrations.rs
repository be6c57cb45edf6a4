//! Schema migrations.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own transaction together with its version row, so a failed
//! script leaves the schema at the previous version.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_calls_table",
        sql: include_str!("sql/001_create_calls.sql"),
    },
    Migration {
        version: 2,
        description: "create_loan_applications_table",
        sql: include_str!("sql/002_create_loan_applications.sql"),
    },
    Migration {
        version: 3,
        description: "create_subscriptions_tables",
        sql: include_str!("sql/003_create_subscriptions.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let failed = |e: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        };

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    fn insert_call(conn: &Connection, id: &str) {
        conn.execute(
            "INSERT INTO calls (id, user_id, title, client_name, audio_url, duration, created_at, updated_at)
             VALUES (?1, 'u1', 'Intro', 'Dana', 'calls/1.wav', 30, '2026-01-01', '2026-01-01')",
            [id],
        )
        .unwrap();
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = migrated();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = migrated();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_lease_and_error_columns_present() {
        let conn = migrated();
        let calls = columns(&conn, "calls");
        for column in ["error_kind", "claim_token", "claimed_at"] {
            assert!(calls.iter().any(|c| c == column), "calls.{}", column);
        }
        let applications = columns(&conn, "loan_applications");
        for column in ["push_claim_token", "push_claimed_at"] {
            assert!(applications.iter().any(|c| c == column), "loan_applications.{}", column);
        }
    }

    #[test]
    fn test_failed_migration_is_not_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE calls (id TEXT);").unwrap();

        let err = run_all(&conn).unwrap_err();
        assert!(matches!(err, DatabaseError::Migration { version: 1, .. }));

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_completed_call_requires_transcript() {
        let conn = migrated();
        insert_call(&conn, "c1");
        let result = conn.execute("UPDATE calls SET status = 'completed' WHERE id = 'c1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_terminal_status_is_final() {
        let conn = migrated();
        insert_call(&conn, "c1");
        conn.execute(
            "UPDATE calls SET status = 'error', error = 'boom' WHERE id = 'c1'",
            [],
        )
        .unwrap();
        let result = conn.execute("UPDATE calls SET status = 'processing' WHERE id = 'c1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let conn = migrated();
        let result = conn.execute(
            "INSERT INTO calls (id, user_id, title, client_name, audio_url, duration, created_at, updated_at)
             VALUES ('c2', 'u1', 'Intro', 'Dana', 'calls/1.wav', -1, '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pushed_status_requires_encompass_id() {
        let conn = migrated();
        let result = conn.execute(
            "INSERT INTO loan_applications (id, user_id, client_name, loan_amount, loan_type, property_type,
                interest_rate, term_years, status, created_at, updated_at)
             VALUES ('a1', 'u1', 'Dana', 100000, 'FHA', 'Condo', 6.0, 30, 'Pushed to Encompass', '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pushed_application_is_final() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO loan_applications (id, user_id, client_name, loan_amount, loan_type, property_type,
                interest_rate, term_years, status, created_at, updated_at)
             VALUES ('a1', 'u1', 'Dana', 100000, 'FHA', 'Condo', 6.0, 30, 'Ready for LOS', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "UPDATE loan_applications SET status = 'Pushed to Encompass', encompass_id = 'EN-1' WHERE id = 'a1'",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "UPDATE loan_applications SET encompass_id = 'EN-2' WHERE id = 'a1'",
            [],
        );
        assert!(result.is_err());
    }
}
