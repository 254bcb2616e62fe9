//! Forecast data for Sunshine
//!
//! Normalized daily forecast records and the HTTP provider that produces them.

pub mod provider;
pub mod types;

pub use provider::{parse_forecast, ForecastProvider, ForecastSource};
pub use sunshine_core::{Location, UnitSystem};
pub use types::*;
