//! Async handles over the blocking SQLite stores.
//!
//! Every call locks the store on a blocking worker thread so SQLite work
//! never runs on an async executor thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use sunshine_weather::{ForecastBatch, ForecastRecord, NormalizedDate};

use crate::store_backend::{ForecastStore, Preferences, StoreError, StoreResult, SyncState};

/// Run `op` against a shared store on the blocking pool.
async fn run_blocking<S, T, F>(
    store: &Arc<Mutex<S>>,
    op: F,
    on_join_error: fn(String) -> StoreError,
) -> StoreResult<T>
where
    S: ?Sized + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&mut *store.lock()))
        .await
        .map_err(|e| on_join_error(e.to_string()))?
}

/// Shared, thread-safe access to a `ForecastStore`.
#[derive(Clone)]
pub struct ForecastRepository {
    store: Arc<Mutex<dyn ForecastStore>>,
}

impl ForecastRepository {
    pub fn new<S: ForecastStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn replace_all(&self, batch: ForecastBatch) -> StoreResult<()> {
        run_blocking(&self.store, move |s| s.replace_all(&batch), StoreError::WriteFailed).await
    }

    pub async fn query_from(&self, from: NormalizedDate) -> StoreResult<Vec<ForecastRecord>> {
        run_blocking(&self.store, move |s| s.query_from(from), StoreError::QueryFailed).await
    }

    pub async fn has_any_from(&self, from: NormalizedDate) -> StoreResult<bool> {
        run_blocking(&self.store, move |s| s.has_any_from(from), StoreError::QueryFailed).await
    }

    pub async fn get(&self, date: NormalizedDate) -> StoreResult<Option<ForecastRecord>> {
        run_blocking(&self.store, move |s| s.get(date), StoreError::QueryFailed).await
    }

    pub async fn count(&self) -> StoreResult<usize> {
        run_blocking(&self.store, |s| s.count(), StoreError::QueryFailed).await
    }
}

/// Shared, thread-safe access to `Preferences`.
#[derive(Clone)]
pub struct PreferencesHandle {
    prefs: Arc<Mutex<dyn Preferences>>,
}

impl PreferencesHandle {
    pub fn new<P: Preferences + 'static>(prefs: P) -> Self {
        Self {
            prefs: Arc::new(Mutex::new(prefs)),
        }
    }

    pub async fn sync_state(&self) -> StoreResult<SyncState> {
        run_blocking(&self.prefs, |p| p.sync_state(), StoreError::QueryFailed).await
    }

    pub async fn set_notifications_enabled(&self, enabled: bool) -> StoreResult<()> {
        run_blocking(
            &self.prefs,
            move |p| p.set_notifications_enabled(enabled),
            StoreError::WriteFailed,
        )
        .await
    }

    pub async fn seed_notifications_enabled(&self, enabled: bool) -> StoreResult<bool> {
        run_blocking(
            &self.prefs,
            move |p| p.seed_notifications_enabled(enabled),
            StoreError::WriteFailed,
        )
        .await
    }

    pub async fn record_notification(&self, at: DateTime<Utc>) -> StoreResult<()> {
        run_blocking(&self.prefs, move |p| p.record_notification(at), StoreError::WriteFailed)
            .await
    }
}
