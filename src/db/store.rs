//! SQLite key/value store implementation.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::LogEntry;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Store connection poisoned")]
    Poisoned,
}

/// Durable mapping from string keys to string values.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DbError>;
    fn put(&self, key: &str, value: &str) -> Result<(), DbError>;
}

/// Persist a down observation under its unique key.
pub fn save_log_entry(store: &dyn StateStore, entry: &LogEntry) -> Result<(), DbError> {
    let value = serde_json::to_string(entry)?;
    store.put(&entry.key(), &value)
}

/// Thread-safe SQLite store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the store at the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Open a store that lives only as long as this process.
    pub fn in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// All persisted down observations, oldest write first.
    pub fn get_log_entries(&self) -> Result<Vec<LogEntry>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT value FROM kv_state WHERE key LIKE 'log:%' ORDER BY updated_at ASC, key ASC",
        )?;

        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        values
            .iter()
            .map(|v| serde_json::from_str(v).map_err(DbError::from))
            .collect()
    }
}

impl StateStore for Store {
    fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
             value=excluded.value, updated_at=strftime('%Y-%m-%d %H:%M:%f', 'now')",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_put() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        assert_eq!(store.get("lastEmailSentTime").unwrap(), None);

        store.put("lastEmailSentTime", "1000").unwrap();
        assert_eq!(store.get("lastEmailSentTime").unwrap().as_deref(), Some("1000"));

        store.put("lastEmailSentTime", "2000").unwrap();
        assert_eq!(store.get("lastEmailSentTime").unwrap().as_deref(), Some("2000"));
    }

    #[test]
    fn test_state_survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = Store::new(tmp.path()).unwrap();
            store.put("lastDiscordReportTime", "42").unwrap();
        }
        let store = Store::new(tmp.path()).unwrap();
        assert_eq!(store.get("lastDiscordReportTime").unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_log_entries() {
        let store = Store::in_memory().unwrap();
        store.put("lastEmailSentTime", "1").unwrap();

        let first = LogEntry::down("https://a.example/", 404, "01/01/2024, 01:00:00 AM");
        let second = LogEntry::down("https://b.example/", 500, "01/01/2024, 01:00:00 AM");
        save_log_entry(&store, &first).unwrap();
        save_log_entry(&store, &second).unwrap();

        let entries = store.get_log_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&first));
        assert!(entries.contains(&second));

        let raw = store.get(&first.key()).unwrap().unwrap();
        assert!(raw.contains("\"statusCode\":404"));
    }
}
