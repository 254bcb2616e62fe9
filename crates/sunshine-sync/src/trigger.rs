//! Recurring trigger registration.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::task::SyncTask;

/// Tag of the recurring forecast sync.
pub const SYNC_TAG: &str = "sunshine-sync";

/// Nominal interval between recurring syncs.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

/// Window after the interval in which a sync may fire.
pub const SYNC_FLEXTIME: Duration = Duration::from_secs(SYNC_INTERVAL.as_secs() / 3);

/// How often an offline trigger re-checks connectivity.
pub const NETWORK_RETRY: Duration = Duration::from_secs(60);

/// A request to run the sync periodically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    pub tag: String,
    pub interval: Duration,
    pub flex: Duration,
    /// Only fire while the network is reachable.
    pub requires_network: bool,
    /// Survive restarts. The in-process registrar re-registers on every
    /// start instead.
    pub persisted: bool,
    /// Replace an existing trigger with the same tag instead of failing.
    pub replace_existing: bool,
}

impl TriggerSpec {
    /// The forecast sync trigger: every 3 hours, 1 hour of flex.
    pub fn recurring_sync() -> Self {
        Self {
            tag: SYNC_TAG.to_string(),
            interval: SYNC_INTERVAL,
            flex: SYNC_FLEXTIME,
            requires_network: true,
            persisted: true,
            replace_existing: true,
        }
    }

    /// Delay until the next firing: the interval plus a random share of the flex window.
    pub fn next_delay(&self) -> Duration {
        let flex_ms = u64::try_from(self.flex.as_millis()).unwrap_or(u64::MAX);
        let jitter = if flex_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=flex_ms)
        };
        self.interval + Duration::from_millis(jitter)
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("A trigger tagged '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Trigger registrar has been shut down")]
    ShutDown,
}

/// Registers recurring sync triggers with some execution facility.
pub trait TriggerRegistrar: Send + Sync {
    fn register(&self, spec: TriggerSpec, task: Arc<SyncTask>) -> Result<(), TriggerError>;

    /// Cancel the trigger with `tag`. Returns false if none was registered.
    fn cancel(&self, tag: &str) -> bool;
}

/// Network reachability check used by triggers that require the network.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Treats the network as reachable when the forecast host resolves.
#[derive(Debug, Clone)]
pub struct DnsConnectivity {
    host: String,
    port: u16,
}

impl DnsConnectivity {
    const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build from the forecast endpoint URL. Returns None for URLs without a host.
    pub fn for_url(api_url: &str) -> Option<Self> {
        let url = url::Url::parse(api_url).ok()?;
        let host = url.host_str()?.to_string();
        let port = url.port_or_known_default()?;
        Some(Self::new(host, port))
    }
}

#[async_trait]
impl Connectivity for DnsConnectivity {
    async fn is_online(&self) -> bool {
        let lookup = tokio::net::lookup_host((self.host.as_str(), self.port));
        match tokio::time::timeout(Self::LOOKUP_TIMEOUT, lookup).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                tracing::debug!(host = %self.host, "Lookup failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, "Lookup timed out");
                false
            }
        }
    }
}

/// Always reports the network as reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeOnline;

#[async_trait]
impl Connectivity for AssumeOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Runs triggers as tasks on the current tokio runtime.
pub struct TokioTriggerRegistrar {
    runtime: Handle,
    connectivity: Arc<dyn Connectivity>,
    active: Mutex<HashMap<String, CancellationToken>>,
    shutdown: CancellationToken,
}

impl TokioTriggerRegistrar {
    /// Create a registrar bound to the runtime this is called from.
    pub fn new(connectivity: Arc<dyn Connectivity>) -> Result<Self, TriggerError> {
        let runtime = Handle::try_current().map_err(|e| TriggerError::NoRuntime(e.to_string()))?;
        Ok(Self {
            runtime,
            connectivity,
            active: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.active.lock().contains_key(tag)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Stop every trigger. Later registrations are rejected.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.active.lock().clear();
        tracing::info!("Sync triggers stopped");
    }
}

impl TriggerRegistrar for TokioTriggerRegistrar {
    fn register(&self, spec: TriggerSpec, task: Arc<SyncTask>) -> Result<(), TriggerError> {
        let mut active = self.active.lock();
        if self.shutdown.is_cancelled() {
            return Err(TriggerError::ShutDown);
        }

        if let Some(existing) = active.get(&spec.tag) {
            if !spec.replace_existing {
                return Err(TriggerError::AlreadyRegistered(spec.tag));
            }
            existing.cancel();
            tracing::debug!(tag = %spec.tag, "Replacing existing trigger");
        }

        let token = self.shutdown.child_token();
        active.insert(spec.tag.clone(), token.clone());

        tracing::info!(
            tag = %spec.tag,
            interval_secs = spec.interval.as_secs(),
            flex_secs = spec.flex.as_secs(),
            requires_network = spec.requires_network,
            "Registered recurring sync"
        );

        let connectivity = Arc::clone(&self.connectivity);
        self.runtime.spawn(run_trigger(spec, task, connectivity, token));
        Ok(())
    }

    fn cancel(&self, tag: &str) -> bool {
        match self.active.lock().remove(tag) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

async fn run_trigger(
    spec: TriggerSpec,
    task: Arc<SyncTask>,
    connectivity: Arc<dyn Connectivity>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(spec.next_delay()) => {}
        }

        if spec.requires_network && !wait_for_network(connectivity.as_ref(), &token).await {
            break;
        }

        // Own task so a panicking pass is contained and the schedule survives.
        let pass = Arc::clone(&task);
        match tokio::spawn(async move { pass.sync().await }).await {
            Ok(_) => {}
            Err(e) if e.is_panic() => {
                tracing::error!(tag = %spec.tag, "Sync pass panicked: {}", e);
            }
            Err(e) => {
                tracing::warn!(tag = %spec.tag, "Sync pass cancelled: {}", e);
            }
        }
    }
    tracing::debug!(tag = %spec.tag, "Trigger stopped");
}

/// Wait until the network is reachable. Returns false if cancelled first.
async fn wait_for_network(connectivity: &dyn Connectivity, token: &CancellationToken) -> bool {
    loop {
        if connectivity.is_online().await {
            return true;
        }
        tracing::debug!("Network unavailable, deferring sync");
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(NETWORK_RETRY) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_recurring_sync_spec() {
        let spec = TriggerSpec::recurring_sync();

        assert_eq!(spec.tag, "sunshine-sync");
        assert_eq!(spec.interval, Duration::from_secs(10_800));
        assert_eq!(spec.flex, Duration::from_secs(3_600));
        assert!(spec.requires_network);
        assert!(spec.persisted);
        assert!(spec.replace_existing);
    }

    #[test]
    fn test_next_delay_within_window() {
        let spec = TriggerSpec::recurring_sync();
        for _ in 0..100 {
            let delay = spec.next_delay();
            assert!(delay >= spec.interval);
            assert!(delay <= spec.interval + spec.flex);
        }
    }

    #[test]
    fn test_next_delay_without_flex() {
        let spec = TriggerSpec {
            flex: Duration::ZERO,
            ..TriggerSpec::recurring_sync()
        };
        assert_eq!(spec.next_delay(), spec.interval);
    }

    #[test]
    fn test_dns_connectivity_from_url() {
        let conn = DnsConnectivity::for_url("https://andfun-weather.udacity.com/weather").unwrap();
        assert_eq!(conn.host, "andfun-weather.udacity.com");
        assert_eq!(conn.port, 443);

        let conn = DnsConnectivity::for_url("http://localhost:8080/forecast").unwrap();
        assert_eq!(conn.port, 8080);

        assert!(DnsConnectivity::for_url("not a url").is_none());
    }

    #[test]
    fn test_registrar_requires_runtime() {
        let result = TokioTriggerRegistrar::new(Arc::new(AssumeOnline));
        assert!(matches!(result, Err(TriggerError::NoRuntime(_))));
    }
}
