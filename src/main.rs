use anyhow::Result;
use std::sync::Arc;

use sunshine_core::{AppError, Config, DatabaseError};
use sunshine_services::{
    ForecastRepository, PreferencesHandle, SqliteForecastStore, SqlitePreferences,
};
use sunshine_sync::{
    AssumeOnline, BootstrapOutcome, Connectivity, DnsConnectivity, Notifier, SyncScheduler,
    SyncTask, TokioTriggerRegistrar,
};
use sunshine_weather::ForecastProvider;

#[tokio::main]
async fn main() -> Result<()> {
    sunshine_core::init()?;

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        eprintln!("Sunshine: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), AppError> {
    let (config, _validation) = Config::load_validated().map_err(AppError::from_anyhow)?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!("Forecast database: {}", db_path.display());

    let store = SqliteForecastStore::new(&db_path).map_err(DatabaseError::from)?;
    let prefs = SqlitePreferences::new(&db_path).map_err(DatabaseError::from)?;
    let prefs = PreferencesHandle::new(prefs);
    let enabled = prefs
        .seed_notifications_enabled(config.notifications.enabled)
        .await
        .map_err(DatabaseError::from)?;
    tracing::info!(enabled, "Notification preference loaded");

    let provider = ForecastProvider::new(&config.weather)?;
    let task = SyncTask::new(
        Arc::new(provider),
        ForecastRepository::new(store),
        prefs,
        notifier(),
        config.weather.units,
    );

    let connectivity: Arc<dyn Connectivity> =
        match DnsConnectivity::for_url(&config.weather.api_url) {
            Some(dns) => Arc::new(dns),
            None => Arc::new(AssumeOnline),
        };
    let registrar = Arc::new(
        TokioTriggerRegistrar::new(connectivity).map_err(|e| AppError::Service(e.to_string()))?,
    );

    let scheduler = SyncScheduler::new(Arc::new(task), registrar.clone())
        .map_err(|e| AppError::Service(e.to_string()))?;
    if let Some(bootstrap) = scheduler.initialize() {
        match bootstrap.await {
            Ok(BootstrapOutcome::AlreadyFresh) => {}
            Ok(BootstrapOutcome::Synced(outcome)) if !outcome.is_refreshed() => {
                tracing::warn!("Initial sync did not refresh the forecast: {:?}", outcome);
            }
            Ok(BootstrapOutcome::Synced(_)) => {}
            Err(e) => tracing::error!("Bootstrap task failed: {}", e),
        }
    }

    tracing::info!("Sunshine started, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    registrar.shutdown();
    tracing::info!("Sunshine stopped");
    Ok(())
}

#[cfg(feature = "desktop-notifications")]
fn notifier() -> Arc<dyn Notifier> {
    Arc::new(sunshine_sync::DesktopNotifier)
}

#[cfg(not(feature = "desktop-notifications"))]
fn notifier() -> Arc<dyn Notifier> {
    Arc::new(sunshine_sync::LogNotifier)
}
