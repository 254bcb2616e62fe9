//! Notification cooldown decision.

use chrono::{DateTime, Utc};
use std::time::Duration;

use sunshine_services::SyncState;

/// Minimum time between two weather notifications.
pub const NOTIFICATION_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Whether a refresh at `now` should surface a notification.
///
/// True iff notifications are enabled and either none was ever shown or at
/// least [`NOTIFICATION_COOLDOWN`] has elapsed since the last one. A last
/// notification in the future counts as not elapsed.
pub fn should_notify(state: &SyncState, now: DateTime<Utc>) -> bool {
    if !state.notifications_enabled {
        return false;
    }

    match state.last_notification {
        None => true,
        Some(last) => now
            .signed_duration_since(last)
            .to_std()
            .map(|elapsed| elapsed >= NOTIFICATION_COOLDOWN)
            .unwrap_or(false),
    }
}
