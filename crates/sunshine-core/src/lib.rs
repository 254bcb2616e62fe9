pub mod config;
pub mod error;

pub use config::{
    Config, Location, NotificationsConfig, StorageConfig, UnitSystem, ValidationResult,
    WeatherConfig,
};
pub use error::{AppError, ConfigError, DatabaseError, NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Application name, used for notification titles and the config directory.
pub const APP_NAME: &str = "Sunshine";

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Install the global tracing subscriber. Honors `RUST_LOG`.
pub fn init() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "{} starting", APP_NAME);
    Ok(())
}
