//! One sync pass: fetch, replace the stored forecast, maybe notify.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use sunshine_core::UnitSystem;
use sunshine_services::{ForecastRepository, PreferencesHandle, StoreError};
use sunshine_weather::{FetchError, ForecastRecord, ForecastSource, NormalizedDate};

use crate::gate::should_notify;
use crate::notification::{NotificationPayload, Notifier, NotifyError};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Result of a single sync pass.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The store now holds exactly the fetched batch.
    Refreshed {
        rows: usize,
        notification: NotificationOutcome,
    },
    /// The fetch succeeded with zero days. The store was left alone.
    Empty,
    FetchFailed(FetchError),
    StoreFailed(StoreError),
}

impl SyncOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }
}

/// What happened to the notification after a successful refresh.
#[derive(Debug)]
pub enum NotificationOutcome {
    Shown,
    /// Disabled, or still inside the cooldown window.
    NotDue,
    NotifierFailed(NotifyError),
    /// Sync state could not be read; nothing was shown.
    StateUnavailable(StoreError),
    /// Shown, but the timestamp could not be saved.
    ShownUnrecorded(StoreError),
}

/// Fetches the forecast, replaces the stored generation and gates the
/// notification.
///
/// Passes are single-flight: a `sync` call made while another is running
/// waits for it to finish, so fetch/replace/notify never interleave.
pub struct SyncTask {
    source: Arc<dyn ForecastSource>,
    store: ForecastRepository,
    prefs: PreferencesHandle,
    notifier: Arc<dyn Notifier>,
    units: UnitSystem,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<()>,
}

impl SyncTask {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        store: ForecastRepository,
        prefs: PreferencesHandle,
        notifier: Arc<dyn Notifier>,
        units: UnitSystem,
    ) -> Self {
        Self {
            source,
            store,
            prefs,
            notifier,
            units,
            clock: Arc::new(SystemClock),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &ForecastRepository {
        &self.store
    }

    /// Today's UTC day according to the task's clock.
    pub fn today(&self) -> NormalizedDate {
        NormalizedDate::from_instant(self.clock.now())
    }

    /// Run one pass. Failures are logged and reported, never propagated.
    pub async fn sync(&self) -> SyncOutcome {
        let _guard = self.in_flight.lock().await;

        let outcome = self.run_once().await;
        match &outcome {
            SyncOutcome::Refreshed { rows, notification } => {
                tracing::info!(rows, ?notification, "Forecast refreshed");
            }
            SyncOutcome::Empty => {
                tracing::info!("Forecast fetch returned no days, keeping stored forecast");
            }
            SyncOutcome::FetchFailed(e) => {
                tracing::warn!(kind = e.kind(), "Forecast fetch failed: {}", e);
            }
            SyncOutcome::StoreFailed(e) => {
                tracing::error!("Failed to store forecast: {}", e);
            }
        }
        outcome
    }

    async fn run_once(&self) -> SyncOutcome {
        let batch = match self.source.fetch(self.today()).await {
            Ok(batch) => batch,
            Err(e) => return SyncOutcome::FetchFailed(e),
        };

        let Some(first) = batch.first().cloned() else {
            return SyncOutcome::Empty;
        };
        let rows = batch.len();

        if let Err(e) = self.store.replace_all(batch).await {
            return SyncOutcome::StoreFailed(e);
        }

        let notification = self.notify_if_due(&first).await;
        SyncOutcome::Refreshed { rows, notification }
    }

    async fn notify_if_due(&self, today: &ForecastRecord) -> NotificationOutcome {
        let state = match self.prefs.sync_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Failed to read sync state: {}", e);
                return NotificationOutcome::StateUnavailable(e);
            }
        };

        let now = self.clock.now();
        if !should_notify(&state, now) {
            tracing::debug!(last = ?state.last_notification, "Notification not due");
            return NotificationOutcome::NotDue;
        }

        let payload = NotificationPayload::for_record(today, self.units);
        if let Err(e) = self.notifier.notify(&payload).await {
            tracing::warn!("Failed to show notification: {}", e);
            return NotificationOutcome::NotifierFailed(e);
        }

        match self.prefs.record_notification(now).await {
            Ok(()) => NotificationOutcome::Shown,
            Err(e) => {
                tracing::error!("Notification shown but not recorded: {}", e);
                NotificationOutcome::ShownUnrecorded(e)
            }
        }
    }
}
