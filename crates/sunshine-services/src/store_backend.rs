//! Storage traits and error types.
//!
//! `ForecastStore` abstracts the persisted forecast rows and `Preferences`
//! the small key/value state the sync pipeline reads and writes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use sunshine_core::DatabaseError;
use sunshine_weather::{ForecastBatch, ForecastRecord, NormalizedDate};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or initialized.
    #[error("Failed to open store: {0}")]
    Open(String),

    /// A write (or the transaction around it) failed; nothing was committed.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A read failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be interpreted.
    #[error("Corrupt value for {key}: {value}")]
    Corrupt { key: String, value: String },
}

impl StoreError {
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }
}

impl From<StoreError> for DatabaseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Open(msg) => DatabaseError::Unavailable(msg),
            StoreError::Corrupt { .. } => DatabaseError::Corrupt(err.to_string()),
            StoreError::WriteFailed(msg) | StoreError::QueryFailed(msg) => {
                DatabaseError::OperationFailed(msg)
            }
        }
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted forecast rows, keyed by normalized date.
///
/// Note: Implementations don't need to be Sync - `ForecastRepository`
/// handles thread-safe access via Mutex.
pub trait ForecastStore: Send {
    /// Discard every stored row and insert `batch` as the only generation.
    ///
    /// Readers observe either the old rows or the new rows, never a mix and
    /// never an empty intermediate state. On error the old rows remain.
    fn replace_all(&mut self, batch: &ForecastBatch) -> StoreResult<()>;

    /// Rows with `date >= from`, ascending.
    fn query_from(&self, from: NormalizedDate) -> StoreResult<Vec<ForecastRecord>>;

    /// Whether any row exists with `date >= from`.
    fn has_any_from(&self, from: NormalizedDate) -> StoreResult<bool> {
        Ok(!self.query_from(from)?.is_empty())
    }

    /// The row for exactly `date`.
    fn get(&self, date: NormalizedDate) -> StoreResult<Option<ForecastRecord>>;

    /// Number of stored rows.
    fn count(&self) -> StoreResult<usize>;
}

/// Process-independent sync state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    /// When the last notification was actually shown
    pub last_notification: Option<DateTime<Utc>>,
    pub notifications_enabled: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_notification: None,
            notifications_enabled: true,
        }
    }
}

/// Read/write access to user preferences and notification bookkeeping.
pub trait Preferences: Send {
    /// Current state. Missing or unparseable keys take `SyncState::default()`
    /// values.
    fn sync_state(&self) -> StoreResult<SyncState>;

    fn set_notifications_enabled(&mut self, enabled: bool) -> StoreResult<()>;

    /// Store `enabled` only if the preference has never been written.
    /// Returns the effective value.
    fn seed_notifications_enabled(&mut self, enabled: bool) -> StoreResult<bool>;

    /// Record that a notification was shown at `at`.
    fn record_notification(&mut self, at: DateTime<Utc>) -> StoreResult<()>;
}
