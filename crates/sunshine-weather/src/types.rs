use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sunshine_core::{AppError, NetworkError, ReqwestErrorExt};

/// A UTC calendar day.
///
/// Every forecast row is keyed by one of these, so "is this today's row"
/// is an equality check rather than a range comparison. Persisted as the
/// epoch milliseconds of UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormalizedDate(NaiveDate);

impl NormalizedDate {
    /// Normalize an instant to its UTC day.
    pub fn from_instant(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    /// Today's UTC day.
    pub fn today() -> Self {
        Self::from_instant(Utc::now())
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Rebuild a date from stored epoch milliseconds.
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self::from_instant)
    }

    /// Epoch milliseconds of this day's UTC midnight.
    pub fn epoch_millis(&self) -> i64 {
        self.0.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
    }

    /// The day `days` after this one.
    pub fn plus_days(&self, days: u64) -> Option<Self> {
        self.0.checked_add_days(Days::new(days)).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One day of forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub date: NormalizedDate,
    /// Provider condition id (OpenWeatherMap numbering)
    pub condition_id: i32,
    pub min_temp: f64,
    pub max_temp: f64,
    /// Percent
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    pub wind_speed: f64,
    /// Meteorological degrees: 0 is north, 180 is south
    pub wind_direction: f64,
}

impl ForecastRecord {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_condition_id(self.condition_id)
    }
}

/// Consecutive days of forecast in ascending date order.
///
/// An empty batch means the provider had nothing to report, which is not
/// a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastBatch {
    records: Vec<ForecastRecord>,
}

impl ForecastBatch {
    /// Build a batch, sorting records by date.
    pub fn new(mut records: Vec<ForecastRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// The earliest day, i.e. today's forecast for a fresh batch.
    pub fn first(&self) -> Option<&ForecastRecord> {
        self.records.first()
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ForecastRecord> {
        self.records
    }
}

/// Weather condition categories mapped from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Storm,
    Drizzle,
    Rain,
    HeavyRain,
    FreezingRain,
    Snow,
    Sleet,
    Fog,
    Clear,
    LightClouds,
    Cloudy,
    Unknown,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_condition_id(id: i32) -> Self {
        match id {
            200..=232 => Self::Storm,
            300..=321 => Self::Drizzle,
            500 | 501 | 520..=531 => Self::Rain,
            502..=504 => Self::HeavyRain,
            511 => Self::FreezingRain,
            611..=616 => Self::Sleet,
            600..=610 | 617..=622 => Self::Snow,
            701..=762 => Self::Fog,
            771 | 781 => Self::Storm, // Squalls, tornado
            800 => Self::Clear,
            801 => Self::LightClouds,
            802..=804 => Self::Cloudy,
            900..=906 | 957..=962 => Self::Storm, // Extreme / high wind
            951..=956 => Self::Clear,             // Calm through breeze
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Storm => "Storm",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::FreezingRain => "Freezing Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Fog => "Fog",
            Self::Clear => "Clear",
            Self::LightClouds => "Light Clouds",
            Self::Cloudy => "Cloudy",
            Self::Unknown => "Unknown",
        }
    }

    /// Icon selector handed to the notification surface
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Storm => "storm",
            Self::Drizzle => "light_rain",
            Self::Rain | Self::HeavyRain => "rain",
            Self::FreezingRain | Self::Snow | Self::Sleet => "snow",
            Self::Fog => "fog",
            Self::Clear | Self::Unknown => "clear",
            Self::LightClouds => "light_clouds",
            Self::Cloudy => "cloudy",
        }
    }
}

/// Forecast retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Upstream error {code}: {message}")]
    UpstreamReported { code: i64, message: String },
}

impl FetchError {
    /// Short class name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
            Self::UpstreamReported { .. } => "upstream",
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        let network = match err {
            FetchError::Network(e) => e.into_network_error(),
            FetchError::Decode(msg) => NetworkError::Malformed(msg),
            FetchError::UpstreamReported { code, message } => NetworkError::Rejected {
                status: u16::try_from(code).unwrap_or(0),
                message,
            },
        };
        AppError::Network(network)
    }
}
