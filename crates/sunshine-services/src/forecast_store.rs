//! SQLite-based forecast storage implementation.
//!
//! This module provides `SqliteForecastStore`, the local SQLite implementation
//! of the `ForecastStore` trait. One row per normalized day.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use sunshine_weather::{ForecastBatch, ForecastRecord, NormalizedDate};

use crate::store_backend::{ForecastStore, StoreError, StoreResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str =
    "SELECT date, weather_id, min, max, humidity, pressure, wind, degrees FROM weather";

/// SQLite-based forecast storage.
pub struct SqliteForecastStore {
    conn: Connection,
}

impl SqliteForecastStore {
    /// Create a new forecast store at the given path.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::Open(e.to_string()))?;
        // WAL lets other connections keep reading the old generation while a
        // replace transaction is open.
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| StoreError::Open(e.to_string()))?;
        tracing::debug!("Forecast store journal mode: {}", mode);

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory forecast store (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> StoreResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS weather (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date INTEGER NOT NULL UNIQUE,
                    weather_id INTEGER NOT NULL,
                    min REAL NOT NULL,
                    max REAL NOT NULL,
                    humidity REAL NOT NULL,
                    pressure REAL NOT NULL,
                    wind REAL NOT NULL,
                    degrees REAL NOT NULL
                );
                "#,
            )
            .map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(())
    }

    /// Convert a database row to a ForecastRecord.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ForecastRecord> {
        let millis: i64 = row.get(0)?;
        let date = NormalizedDate::from_epoch_millis(millis)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, millis))?;

        Ok(ForecastRecord {
            date,
            condition_id: row.get(1)?,
            min_temp: row.get(2)?,
            max_temp: row.get(3)?,
            humidity: row.get(4)?,
            pressure: row.get(5)?,
            wind_speed: row.get(6)?,
            wind_direction: row.get(7)?,
        })
    }
}

impl ForecastStore for SqliteForecastStore {
    fn replace_all(&mut self, batch: &ForecastBatch) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::write(e.to_string()))?;

        let deleted = tx
            .execute("DELETE FROM weather", [])
            .map_err(|e| StoreError::write(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO weather (date, weather_id, min, max, humidity, pressure, wind, degrees)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(|e| StoreError::write(e.to_string()))?;

            for record in batch.records() {
                stmt.execute(params![
                    record.date.epoch_millis(),
                    record.condition_id,
                    record.min_temp,
                    record.max_temp,
                    record.humidity,
                    record.pressure,
                    record.wind_speed,
                    record.wind_direction,
                ])
                .map_err(|e| StoreError::write(format!("{} ({})", e, record.date)))?;
            }
        }

        // Dropping an uncommitted transaction rolls back.
        tx.commit().map_err(|e| StoreError::write(e.to_string()))?;

        tracing::debug!(
            "Replaced {} forecast row(s) with {}",
            deleted,
            batch.len()
        );
        Ok(())
    }

    fn query_from(&self, from: NormalizedDate) -> StoreResult<Vec<ForecastRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE date >= ?1 ORDER BY date ASC", SELECT_COLUMNS))
            .map_err(|e| StoreError::query(e.to_string()))?;

        let rows = stmt
            .query_map(params![from.epoch_millis()], Self::row_to_record)
            .map_err(|e| StoreError::query(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::query(e.to_string()))
    }

    fn has_any_from(&self, from: NormalizedDate) -> StoreResult<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM weather WHERE date >= ?1)",
                params![from.epoch_millis()],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::query(e.to_string()))
    }

    fn get(&self, date: NormalizedDate) -> StoreResult<Option<ForecastRecord>> {
        self.conn
            .query_row(
                &format!("{} WHERE date = ?1", SELECT_COLUMNS),
                params![date.epoch_millis()],
                Self::row_to_record,
            )
            .optional()
            .map_err(|e| StoreError::query(e.to_string()))
    }

    fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))
            .map_err(|e| StoreError::query(e.to_string()))?;
        Ok(count as usize)
    }
}
