//! Idempotent startup: register the recurring sync and bootstrap an empty store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::task::{SyncOutcome, SyncTask};
use crate::trigger::{TriggerError, TriggerRegistrar, TriggerSpec};

/// What the startup check decided.
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// The store already holds forecast rows from today on.
    AlreadyFresh,
    /// The store was empty (or could not be checked) and a sync ran.
    Synced(SyncOutcome),
}

/// Owns the one-time initialization of the sync pipeline.
pub struct SyncScheduler {
    runtime: Handle,
    task: Arc<SyncTask>,
    registrar: Arc<dyn TriggerRegistrar>,
    spec: TriggerSpec,
    initialized: AtomicBool,
}

impl SyncScheduler {
    /// Must be called from within a Tokio runtime; background work is
    /// spawned on that runtime even when later calls come from outside it.
    pub fn new(
        task: Arc<SyncTask>,
        registrar: Arc<dyn TriggerRegistrar>,
    ) -> Result<Self, TriggerError> {
        let runtime = Handle::try_current().map_err(|e| TriggerError::NoRuntime(e.to_string()))?;
        Ok(Self {
            runtime,
            task,
            registrar,
            spec: TriggerSpec::recurring_sync(),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn with_trigger_spec(mut self, spec: TriggerSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Register the recurring sync and, in the background, sync immediately
    /// if the store holds nothing for today or later.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub fn initialize(&self) -> Option<JoinHandle<BootstrapOutcome>> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Sync already initialized");
            return None;
        }

        if let Err(e) = self
            .registrar
            .register(self.spec.clone(), Arc::clone(&self.task))
        {
            tracing::error!("Failed to register recurring sync: {}", e);
        }

        let task = Arc::clone(&self.task);
        Some(self.runtime.spawn(async move { bootstrap(&task).await }))
    }

    /// Run a sync pass now, in the background.
    pub fn start_immediate_sync(&self) -> JoinHandle<SyncOutcome> {
        let task = Arc::clone(&self.task);
        self.runtime.spawn(async move { task.sync().await })
    }
}

async fn bootstrap(task: &SyncTask) -> BootstrapOutcome {
    let today = task.today();
    match task.store().has_any_from(today).await {
        Ok(true) => {
            tracing::info!(%today, "Stored forecast is current");
            BootstrapOutcome::AlreadyFresh
        }
        Ok(false) => {
            tracing::info!(%today, "No stored forecast from today on, syncing now");
            BootstrapOutcome::Synced(task.sync().await)
        }
        Err(e) => {
            tracing::warn!("Could not check stored forecast, syncing now: {}", e);
            BootstrapOutcome::Synced(task.sync().await)
        }
    }
}
