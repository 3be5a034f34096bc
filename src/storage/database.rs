//! SQLite result store with migrations
//!
//! Each row is one completed work unit. Rows are only ever inserted, never
//! updated, so a crash mid-run leaves every earlier unit intact.

use super::{ResultStore, UnitKey};
use crate::error::{JobMatchError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// SQLite-backed `ResultStore`
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| JobMatchError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| JobMatchError::Store(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.migrate()?;

        tracing::debug!("Opened result store at {}", db_path.display());
        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| JobMatchError::Store(format!("Failed to get connection: {}", e)))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Row counts per stage
    pub fn stats(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT stage, COUNT(*) FROM results GROUP BY stage ORDER BY stage")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }
}

impl ResultStore for Database {
    fn get(&self, key: &UnitKey) -> Result<Option<Value>> {
        let conn = self.get_conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM results WHERE stage = ?1 AND candidate_id = ?2 AND item = ?3",
                params![key.stage, key.candidate_id, key.item],
                |row| row.get(0),
            )
            .optional()?;

        payload
            .map(|text| {
                serde_json::from_str(&text).map_err(|e| JobMatchError::Json {
                    source: e,
                    context: format!("Stored payload for {} is not valid JSON", key),
                })
            })
            .transpose()
    }

    fn put(&self, key: &UnitKey, value: &Value) -> Result<bool> {
        let payload = serde_json::to_string(value).map_err(|e| JobMatchError::Json {
            source: e,
            context: format!("Failed to serialize payload for {}", key),
        })?;

        let conn = self.get_conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO results (stage, candidate_id, item, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.stage,
                key.candidate_id,
                key.item,
                payload,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        Ok(inserted == 1)
    }

    fn exists(&self, key: &UnitKey) -> Result<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM results WHERE stage = ?1 AND candidate_id = ?2 AND item = ?3",
                params![key.stage, key.candidate_id, key.item],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: completed work units
    r#"
    CREATE TABLE results (
        stage TEXT NOT NULL,
        candidate_id TEXT NOT NULL,
        item TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (stage, candidate_id, item)
    );

    CREATE INDEX idx_results_candidate ON results(stage, candidate_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("store").join("results.sqlite");
        let db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = db.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_put_is_insert_if_absent() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("results.sqlite")).unwrap();
        let key = UnitKey::matching("c1", "J1");

        assert!(!db.exists(&key).unwrap());
        assert!(db.put(&key, &json!({"inclusion": {}})).unwrap());
        assert!(!db.put(&key, &json!("overwritten?")).unwrap());

        assert!(db.exists(&key).unwrap());
        assert_eq!(db.get(&key).unwrap(), Some(json!({"inclusion": {}})));
        assert_eq!(db.get(&UnitKey::matching("c1", "J2")).unwrap(), None);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.sqlite");
        {
            let db = Database::new(&path).unwrap();
            db.put(&UnitKey::matching("c1", "J1"), &json!("raw reply")).unwrap();
        }

        let db = Database::new(&path).unwrap();
        assert_eq!(db.get(&UnitKey::matching("c1", "J1")).unwrap(), Some(json!("raw reply")));
        assert_eq!(db.stats().unwrap(), vec![("matching".to_string(), 1)]);
    }
}
