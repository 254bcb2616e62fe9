//! Notification payloads and delivery backends.

use async_trait::async_trait;
use thiserror::Error;

use sunshine_core::{UnitSystem, APP_NAME};
use sunshine_weather::ForecastRecord;

/// What a notifier shows for today's forecast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Icon name derived from the weather condition.
    pub icon: String,
    /// Where activating the notification should lead, e.g. `forecast/1792281600000`.
    pub target: String,
}

impl NotificationPayload {
    pub fn for_record(record: &ForecastRecord, units: UnitSystem) -> Self {
        let condition = record.condition();
        Self {
            title: APP_NAME.to_string(),
            body: format!(
                "Forecast: {} - High: {} Low: {}",
                condition.description(),
                units.format_temperature(record.max_temp),
                units.format_temperature(record.min_temp),
            ),
            icon: condition.icon_name().to_string(),
            target: format!("forecast/{}", record.date.epoch_millis()),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to show notification: {0}")]
    Failed(String),
}

/// A surface that can show a notification to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no desktop backend is built in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        tracing::info!(
            icon = %payload.icon,
            target = %payload.target,
            "{}: {}",
            payload.title,
            payload.body
        );
        Ok(())
    }
}

/// Shows notifications through the desktop notification service.
#[cfg(feature = "desktop-notifications")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

#[cfg(feature = "desktop-notifications")]
#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let payload = payload.clone();
        tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .appname(APP_NAME)
                .summary(&payload.title)
                .body(&payload.body)
                .icon(&payload.icon)
                .show()
                .map(|_| ())
                .map_err(|e| NotifyError::Failed(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::Unavailable(e.to_string()))?
    }
}
