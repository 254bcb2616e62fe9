pub mod gate;
pub mod notification;
pub mod scheduler;
pub mod task;
pub mod trigger;

pub use gate::{should_notify, NOTIFICATION_COOLDOWN};
#[cfg(feature = "desktop-notifications")]
pub use notification::DesktopNotifier;
pub use notification::{LogNotifier, NotificationPayload, Notifier, NotifyError};
pub use scheduler::{BootstrapOutcome, SyncScheduler};
pub use task::{Clock, NotificationOutcome, SyncOutcome, SyncTask, SystemClock};
pub use trigger::{
    AssumeOnline, Connectivity, DnsConnectivity, TokioTriggerRegistrar, TriggerError,
    TriggerRegistrar, TriggerSpec, SYNC_FLEXTIME, SYNC_INTERVAL, SYNC_TAG,
};
