//! Daily forecast retrieval from an OpenWeatherMap-style endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use sunshine_core::{Location, UnitSystem, WeatherConfig};

use crate::types::{FetchError, ForecastBatch, ForecastRecord, NormalizedDate};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "Sunshine/0.1.0";

/// Status the upstream API reports in `cod` for a usable payload.
const UPSTREAM_OK: i64 = 200;

/// Anything that can produce a forecast batch.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Fetch the forecast for the configured location, dating the first
    /// entry `today` and each following entry one day later.
    ///
    /// Never returns partial data: either every day decoded or an error.
    async fn fetch(&self, today: NormalizedDate) -> Result<ForecastBatch, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ForecastProvider {
    client: Arc<Client>,
    base_url: String,
    location: Location,
    units: UnitSystem,
    days: u32,
}

impl ForecastProvider {
    pub fn new(config: &WeatherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.api_url.clone(),
            location: config.location.clone(),
            units: config.units,
            days: config.forecast_days,
        })
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    /// Query parameters for the configured location and units.
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = match &self.location {
            Location::Place { place } => vec![("q", place.clone())],
            Location::Coordinates {
                latitude,
                longitude,
            } => vec![("lat", latitude.to_string()), ("lon", longitude.to_string())],
        };
        params.push(("mode", "json".to_string()));
        params.push(("units", self.units.as_query().to_string()));
        params.push(("cnt", self.days.to_string()));
        params
    }
}

#[async_trait]
impl ForecastSource for ForecastProvider {
    #[instrument(skip(self), level = "info")]
    async fn fetch(&self, today: NormalizedDate) -> Result<ForecastBatch, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Error payloads usually still carry `cod`/`message`
            return Err(match upstream_error(&body) {
                Some(err) => err,
                None => FetchError::UpstreamReported {
                    code: i64::from(status.as_u16()),
                    message: status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string(),
                },
            });
        }

        let batch = parse_forecast(&body, today)?;
        tracing::info!("Fetched {} forecast day(s)", batch.len());
        Ok(batch)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<DailyEntry>,
}

#[derive(Debug, Deserialize)]
struct DailyEntry {
    pressure: f64,
    humidity: f64,
    speed: f64,
    deg: f64,
    weather: Vec<ConditionEntry>,
    temp: TemperatureRange,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct TemperatureRange {
    min: f64,
    max: f64,
}

/// Read the `cod` field, which the API sends either as a number or a string.
fn status_code(value: &serde_json::Value) -> Option<i64> {
    match value.get("cod")? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map an upstream `cod` other than 200 to an error.
fn upstream_error(body: &str) -> Option<FetchError> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let code = status_code(&value)?;
    if code == UPSTREAM_OK {
        return None;
    }
    let message = match value.get("message") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Some(FetchError::UpstreamReported { code, message })
}

/// Decode a forecast payload. Day `i` of the list is dated `today + i`.
pub fn parse_forecast(body: &str, today: NormalizedDate) -> Result<ForecastBatch, FetchError> {
    if let Some(err) = upstream_error(body) {
        return Err(err);
    }

    let response: ForecastResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let records = response
        .list
        .into_iter()
        .enumerate()
        .map(|(offset, entry)| {
            let date = today
                .plus_days(offset as u64)
                .ok_or_else(|| FetchError::Decode(format!("date overflow at day {}", offset)))?;
            let condition_id = entry
                .weather
                .first()
                .map(|w| w.id)
                .ok_or_else(|| FetchError::Decode(format!("no condition for day {}", offset)))?;

            Ok(ForecastRecord {
                date,
                condition_id,
                min_temp: entry.temp.min,
                max_temp: entry.temp.max,
                humidity: entry.humidity,
                pressure: entry.pressure,
                wind_speed: entry.speed,
                wind_direction: entry.deg,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(ForecastBatch::new(records))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(condition_id: i32, min: f64, max: f64) -> serde_json::Value {
        serde_json::json!({
            "dt": 1_760_788_800,
            "temp": { "day": max, "min": min, "max": max, "night": min },
            "pressure": 1013.5,
            "humidity": 81,
            "weather": [{ "id": condition_id, "main": "Clear", "description": "sky is clear", "icon": "01d" }],
            "speed": 1.2,
            "deg": 300,
            "clouds": 0
        })
    }

    fn today() -> NormalizedDate {
        NormalizedDate::from_ymd(2026, 10, 18).unwrap()
    }

    fn provider_for(server: &MockServer, location: Location) -> ForecastProvider {
        let config = WeatherConfig {
            api_url: format!("{}/weather", server.uri()),
            location,
            units: UnitSystem::Metric,
            forecast_days: 7,
        };
        ForecastProvider::new(&config).unwrap()
    }

    #[test]
    fn test_parse_assigns_consecutive_days() {
        let body = serde_json::json!({
            "cod": "200",
            "message": 0.0123,
            "cnt": 3,
            "list": [day(800, 7.0, 14.0), day(500, 6.0, 11.0), day(801, 5.0, 12.0)]
        })
        .to_string();

        let batch = parse_forecast(&body, today()).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.records()[0].date, today());
        assert_eq!(batch.records()[2].date, today().plus_days(2).unwrap());

        let first = batch.first().unwrap();
        assert_eq!(first.condition_id, 800);
        assert_eq!(first.min_temp, 7.0);
        assert_eq!(first.max_temp, 14.0);
        assert_eq!(first.humidity, 81.0);
        assert_eq!(first.wind_direction, 300.0);
    }

    #[test]
    fn test_parse_empty_list_is_success() {
        let body = r#"{"cod":"200","message":0,"cnt":0,"list":[]}"#;
        let batch = parse_forecast(body, today()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_parse_upstream_error_code() {
        let body = r#"{"cod":"404","message":"city not found"}"#;
        let err = parse_forecast(body, today()).unwrap_err();
        assert!(matches!(
            err,
            FetchError::UpstreamReported { code: 404, ref message } if message == "city not found"
        ));
    }

    #[test]
    fn test_parse_numeric_error_code() {
        let body = r#"{"cod":401,"message":"Invalid API key"}"#;
        let err = parse_forecast(body, today()).unwrap_err();
        assert!(matches!(err, FetchError::UpstreamReported { code: 401, .. }));
    }

    #[test]
    fn test_parse_malformed_payload() {
        assert!(matches!(
            parse_forecast("not json", today()),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(
            parse_forecast(r#"{"cod":"200"}"#, today()),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_missing_condition_rejects_whole_batch() {
        let mut broken = day(800, 1.0, 2.0);
        broken["weather"] = serde_json::json!([]);
        let body = serde_json::json!({ "cod": "200", "list": [day(800, 7.0, 14.0), broken] })
            .to_string();
        assert!(matches!(parse_forecast(&body, today()), Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_by_place() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Mountain View, CA"))
            .and(query_param("units", "metric"))
            .and(query_param("cnt", "7"))
            .and(query_param("mode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": "200",
                "list": [day(800, 7.0, 14.0), day(801, 8.0, 15.0)]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(
            &server,
            Location::Place {
                place: "Mountain View, CA".to_string(),
            },
        );
        let batch = provider.fetch(today()).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.first().unwrap().date, today());
        assert_eq!(batch.records()[1].date, today().plus_days(1).unwrap());
    }

    #[tokio::test]
    async fn test_fetch_by_coordinates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "47.6"))
            .and(query_param("lon", "-122.3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cod": 200,
                "list": [day(500, 7.0, 14.0)]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(
            &server,
            Location::Coordinates {
                latitude: 47.6,
                longitude: -122.3,
            },
        );
        let batch = provider.fetch(today()).await.unwrap();
        assert_eq!(batch.first().unwrap().condition_id, 500);
    }

    #[tokio::test]
    async fn test_fetch_not_found_with_payload() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Location::default());
        let err = provider.fetch(today()).await.unwrap_err();
        assert!(matches!(err, FetchError::UpstreamReported { code: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_server_error_without_payload() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Location::default());
        let err = provider.fetch(today()).await.unwrap_err();
        assert!(matches!(err, FetchError::UpstreamReported { code: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let config = WeatherConfig {
            api_url: "http://127.0.0.1:9/weather".to_string(),
            ..WeatherConfig::default()
        };
        let provider = ForecastProvider::new(&config).unwrap();
        let err = provider.fetch(today()).await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
