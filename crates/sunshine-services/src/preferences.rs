//! SQLite-backed key/value preferences.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use crate::store_backend::{Preferences, StoreError, StoreResult, SyncState};

const KEY_NOTIFICATIONS_ENABLED: &str = "notifications_enabled";
const KEY_LAST_NOTIFICATION: &str = "last_notification";

pub struct SqlitePreferences {
    conn: Connection,
}

impl SqlitePreferences {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::Open(e.to_string()))?;
        let prefs = Self { conn };
        prefs.init_schema()?;
        Ok(prefs)
    }

    /// Create in-memory preferences (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        let prefs = Self { conn };
        prefs.init_schema()?;
        Ok(prefs)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS preferences (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                "#,
            )
            .map_err(|e| StoreError::Open(e.to_string()))
    }

    fn get_value(&self, key: &str) -> StoreResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::query(e.to_string()))
    }

    fn set_value(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO preferences (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| StoreError::write(e.to_string()))?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: String) -> StoreResult<bool> {
    match value.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(StoreError::Corrupt {
            key: key.to_string(),
            value,
        }),
    }
}

fn parse_instant(key: &str, value: String) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            value,
        })
}

/// A value that cannot be parsed falls back to `fallback` so the pipeline
/// keeps working; the next write of that key replaces it.
fn or_fallback<T>(parsed: StoreResult<T>, fallback: T) -> T {
    parsed.unwrap_or_else(|e| {
        tracing::warn!("Ignoring stored preference: {}", e);
        fallback
    })
}

impl Preferences for SqlitePreferences {
    fn sync_state(&self) -> StoreResult<SyncState> {
        let defaults = SyncState::default();

        let notifications_enabled = match self.get_value(KEY_NOTIFICATIONS_ENABLED)? {
            Some(v) => or_fallback(
                parse_bool(KEY_NOTIFICATIONS_ENABLED, v),
                defaults.notifications_enabled,
            ),
            None => defaults.notifications_enabled,
        };
        let last_notification = match self.get_value(KEY_LAST_NOTIFICATION)? {
            Some(v) => or_fallback(parse_instant(KEY_LAST_NOTIFICATION, v).map(Some), None),
            None => None,
        };

        Ok(SyncState {
            last_notification,
            notifications_enabled,
        })
    }

    fn set_notifications_enabled(&mut self, enabled: bool) -> StoreResult<()> {
        self.set_value(KEY_NOTIFICATIONS_ENABLED, &enabled.to_string())
    }

    fn seed_notifications_enabled(&mut self, enabled: bool) -> StoreResult<bool> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO preferences (key, value) VALUES (?1, ?2)",
                params![KEY_NOTIFICATIONS_ENABLED, enabled.to_string()],
            )
            .map_err(|e| StoreError::write(e.to_string()))?;
        Ok(self.sync_state()?.notifications_enabled)
    }

    fn record_notification(&mut self, at: DateTime<Utc>) -> StoreResult<()> {
        self.set_value(KEY_LAST_NOTIFICATION, &at.to_rfc3339())?;
        tracing::debug!("Recorded notification at {}", at);
        Ok(())
    }
}
