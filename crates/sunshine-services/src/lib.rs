pub mod forecast_store;
pub mod preferences;
pub mod repository;
pub mod store_backend;

pub use forecast_store::SqliteForecastStore;
pub use preferences::SqlitePreferences;
pub use repository::{ForecastRepository, PreferencesHandle};
pub use store_backend::{ForecastStore, Preferences, StoreError, StoreResult, SyncState};
