//! Versioned schema migrations.
//!
//! Applied versions are recorded in `_migrations`; each pending migration runs
//! in its own transaction together with its version row, so a failed script
//! leaves no partial schema behind.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version. Scripts only ever add.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "namespaces", sql: include_str!("../../migrations/001_namespaces.sql") },
    Migration { version: 2, name: "buffered_events", sql: include_str!("../../migrations/002_buffered_events.sql") },
];

fn applied_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
    Ok(version)
}

/// Bring the schema up to the latest version. Returns the resulting version.
pub async fn run(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let start = applied_version(conn)?;
        let mut current = start;
        for migration in MIGRATIONS.iter().filter(|m| m.version > start) {
            tracing::debug!(version = migration.version, name = migration.name, "applying cache migration");
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {}", migration.version, migration.name, e)))?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            current = migration.version;
        }
        Ok(current)
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_twice_is_noop() {
        let conn = Connection::open_in_memory().await.unwrap();
        let first = run(&conn).await.unwrap();
        let second = run(&conn).await.unwrap();
        assert_eq!(first, second);

        let tables: i64 = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                     AND name IN ('namespaces', 'entries', 'buffered_events')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[tokio::test]
    async fn test_every_version_recorded() {
        let conn = Connection::open_in_memory().await.unwrap();
        let version = run(&conn).await.unwrap();
        assert_eq!(version, MIGRATIONS.last().map(|m| m.version).unwrap());

        let names: Vec<String> = conn
            .call(|conn| -> rusqlite::Result<Vec<String>> {
                let mut stmt = conn.prepare("SELECT name FROM _migrations ORDER BY version")?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap();
        assert_eq!(names, vec!["namespaces", "buffered_events"]);
    }
}
