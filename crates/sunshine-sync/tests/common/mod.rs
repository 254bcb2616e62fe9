//! Shared fakes for the sync pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use sunshine_core::UnitSystem;
use sunshine_services::{
    ForecastRepository, ForecastStore, PreferencesHandle, SqliteForecastStore, SqlitePreferences,
    StoreError, StoreResult,
};
use sunshine_sync::{
    Clock, Connectivity, NotificationPayload, Notifier, NotifyError, SyncTask, TriggerError,
    TriggerRegistrar, TriggerSpec,
};
use sunshine_weather::{FetchError, ForecastBatch, ForecastRecord, ForecastSource, NormalizedDate};

pub fn record(date: NormalizedDate, condition_id: i32) -> ForecastRecord {
    ForecastRecord {
        date,
        condition_id,
        min_temp: 7.0,
        max_temp: 14.0,
        humidity: 81.0,
        pressure: 1013.5,
        wind_speed: 1.2,
        wind_direction: 300.0,
    }
}

/// `days` consecutive records starting at `start`.
pub fn batch(start: NormalizedDate, days: u64, condition_id: i32) -> ForecastBatch {
    ForecastBatch::new(
        (0..days)
            .map(|i| record(start.plus_days(i).unwrap(), condition_id))
            .collect(),
    )
}

/// Earliest date any test writes, for reading back a whole store.
pub fn epoch() -> NormalizedDate {
    NormalizedDate::from_ymd(2000, 1, 1).unwrap()
}

/// Returns queued results in order, then empty batches.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<ForecastBatch, FetchError>>>,
    requested: Mutex<Vec<NormalizedDate>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<ForecastBatch, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requested: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The start date passed to each fetch, in call order.
    pub fn requested(&self) -> Vec<NormalizedDate> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ForecastSource for ScriptedSource {
    async fn fetch(&self, today: NormalizedDate) -> Result<ForecastBatch, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(today);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ForecastBatch::default()))
    }
}

/// Blocks every fetch until the test releases a permit.
pub struct GatedSource {
    batches: Vec<ForecastBatch>,
    calls: AtomicUsize,
    gate: Semaphore,
}

impl GatedSource {
    pub fn new(batches: Vec<ForecastBatch>) -> Arc<Self> {
        Arc::new(Self {
            batches,
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self, fetches: usize) {
        self.gate.add_permits(fetches);
    }
}

#[async_trait]
impl ForecastSource for GatedSource {
    async fn fetch(&self, _today: NormalizedDate) -> Result<ForecastBatch, FetchError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.unwrap().forget();
        Ok(self.batches[index % self.batches.len()].clone())
    }
}

/// Panics on the first fetch, then behaves.
pub struct PanicOnceSource {
    calls: AtomicUsize,
    batch: ForecastBatch,
}

impl PanicOnceSource {
    pub fn new(batch: ForecastBatch) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            batch,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastSource for PanicOnceSource {
    async fn fetch(&self, _today: NormalizedDate) -> Result<ForecastBatch, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("forecast source exploded");
        }
        Ok(self.batch.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<NotificationPayload>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn shown(&self) -> Vec<NotificationPayload> {
        self.shown.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Unavailable("no notification daemon".into()));
        }
        self.shown.lock().push(payload.clone());
        Ok(())
    }
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    /// 2026-10-18 09:00 UTC.
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        )))
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.0.lock() += by;
    }

    pub fn today(&self) -> NormalizedDate {
        NormalizedDate::from_instant(self.now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

#[derive(Default)]
pub struct RecordingRegistrar {
    specs: Mutex<Vec<TriggerSpec>>,
}

impl RecordingRegistrar {
    pub fn specs(&self) -> Vec<TriggerSpec> {
        self.specs.lock().clone()
    }
}

impl TriggerRegistrar for RecordingRegistrar {
    fn register(&self, spec: TriggerSpec, _task: Arc<SyncTask>) -> Result<(), TriggerError> {
        self.specs.lock().push(spec);
        Ok(())
    }

    fn cancel(&self, tag: &str) -> bool {
        let mut specs = self.specs.lock();
        let before = specs.len();
        specs.retain(|s| s.tag != tag);
        specs.len() != before
    }
}

/// Forecast store whose existence check always fails; everything else works.
pub struct UncheckableStore(pub SqliteForecastStore);

impl UncheckableStore {
    pub fn new() -> Self {
        Self(SqliteForecastStore::in_memory().unwrap())
    }
}

impl ForecastStore for UncheckableStore {
    fn replace_all(&mut self, batch: &ForecastBatch) -> StoreResult<()> {
        self.0.replace_all(batch)
    }

    fn query_from(&self, from: NormalizedDate) -> StoreResult<Vec<ForecastRecord>> {
        self.0.query_from(from)
    }

    fn has_any_from(&self, _from: NormalizedDate) -> StoreResult<bool> {
        Err(StoreError::query("database is locked"))
    }

    fn get(&self, date: NormalizedDate) -> StoreResult<Option<ForecastRecord>> {
        self.0.get(date)
    }

    fn count(&self) -> StoreResult<usize> {
        self.0.count()
    }
}

pub struct Offline;

#[async_trait]
impl Connectivity for Offline {
    async fn is_online(&self) -> bool {
        false
    }
}

/// A task wired to in-memory stores, a recording notifier and a manual clock.
pub struct Harness {
    pub task: Arc<SyncTask>,
    pub store: ForecastRepository,
    pub prefs: PreferencesHandle,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(source: Arc<dyn ForecastSource>) -> Self {
        Self::with_notifier(source, RecordingNotifier::new())
    }

    pub fn with_notifier(source: Arc<dyn ForecastSource>, notifier: Arc<RecordingNotifier>) -> Self {
        let store = ForecastRepository::new(SqliteForecastStore::in_memory().unwrap());
        let prefs = PreferencesHandle::new(SqlitePreferences::in_memory().unwrap());
        Self::with_stores(source, notifier, store, prefs)
    }

    pub fn with_stores(
        source: Arc<dyn ForecastSource>,
        notifier: Arc<RecordingNotifier>,
        store: ForecastRepository,
        prefs: PreferencesHandle,
    ) -> Self {
        let clock = ManualClock::new();

        let task = SyncTask::new(
            source,
            store.clone(),
            prefs.clone(),
            notifier.clone(),
            UnitSystem::Metric,
        )
        .with_clock(clock.clone());

        Self {
            task: Arc::new(task),
            store,
            prefs,
            notifier,
            clock,
        }
    }

    pub fn today(&self) -> NormalizedDate {
        self.clock.today()
    }

    pub async fn stored(&self) -> Vec<ForecastRecord> {
        self.store.query_from(epoch()).await.unwrap()
    }
}
