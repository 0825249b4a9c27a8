//! HTTP client for the OpenWeatherMap 5 day / 3 hour forecast API.
//!
//! One request per position returns the full forecast list (40 entries, three
//! hours apart); [`WeatherService`](crate::WeatherService) picks the entry
//! closest to the time it needs.

use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::error::RetrievalError;
use crate::weather::{ForecastEntry, WeatherProvider, WeatherSnapshot};
use crate::GpsPoint;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Configuration for the OpenWeatherMap client.
#[derive(Debug, Clone)]
pub struct OpenWeatherConfig {
    /// API key sent as `appid`
    pub api_key: String,
    /// API root, without trailing slash.
    /// Default: https://api.openweathermap.org/data/2.5
    pub base_url: String,
    /// Unit system requested from the API. The snapshot fields assume "metric".
    /// Default: "metric"
    pub units: String,
    /// Client-side request timeout.
    /// Default: 10 seconds
    pub request_timeout: Duration,
}

impl OpenWeatherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            units: "metric".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// API response for the forecast endpoint
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ApiForecastItem>,
}

#[derive(Debug, Deserialize)]
struct ApiForecastItem {
    dt: i64,
    main: ApiMain,
    wind: Option<ApiWind>,
    #[serde(default)]
    weather: Vec<ApiCondition>,
    rain: Option<ApiPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct ApiWind {
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    id: u32,
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiPrecipitation {
    #[serde(rename = "3h", default)]
    three_hours: f64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl ApiForecastItem {
    fn into_entry(self) -> Result<ForecastEntry, RetrievalError> {
        let time = DateTime::<Utc>::from_timestamp(self.dt, 0)
            .ok_or_else(|| RetrievalError::Decode(format!("invalid forecast timestamp {}", self.dt)))?;

        let (wind_speed, wind_direction_deg) = self.wind.map_or((0.0, 0.0), |w| (w.speed, w.deg));
        let (condition_code, condition, description) = match self.weather.into_iter().next() {
            Some(c) => (c.id, c.main, c.description),
            None => (0, "Unknown".to_string(), "No data".to_string()),
        };

        Ok(ForecastEntry {
            time,
            snapshot: WeatherSnapshot {
                temperature: self.main.temp,
                feels_like: self.main.feels_like,
                humidity: self.main.humidity,
                pressure: self.main.pressure,
                wind_speed,
                wind_direction_deg,
                precipitation_mm: self.rain.map_or(0.0, |r| r.three_hours),
                condition_code,
                condition,
                description,
            },
        })
    }
}

/// Decode a forecast response body into entries.
pub fn parse_forecast_response(body: &[u8]) -> Result<Vec<ForecastEntry>, RetrievalError> {
    let data: ForecastResponse = serde_json::from_slice(body)
        .map_err(|e| RetrievalError::Decode(format!("JSON parse error: {}", e)))?;

    data.list.into_iter().map(ApiForecastItem::into_entry).collect()
}

/// Human readable message for a failed response: the API's own `message`
/// when the body carries one, the status reason otherwise.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string())
}

/// Forecast provider backed by OpenWeatherMap.
pub struct OpenWeatherProvider {
    client: Client,
    config: OpenWeatherConfig,
    request_count: AtomicU32,
}

impl OpenWeatherProvider {
    pub fn new(config: OpenWeatherConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RetrievalError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            request_count: AtomicU32::new(0),
        })
    }

    fn forecast_url(&self) -> String {
        format!("{}/forecast", self.config.base_url.trim_end_matches('/'))
    }

    /// Requests sent so far.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }
}

impl WeatherProvider for OpenWeatherProvider {
    async fn forecast(
        &self,
        position: GpsPoint,
        _time: DateTime<Utc>,
    ) -> Result<Vec<ForecastEntry>, RetrievalError> {
        let request_num = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        let req_start = Instant::now();

        let response = self
            .client
            .get(self.forecast_url())
            .query(&[
                ("lat", position.latitude.to_string()),
                ("lon", position.longitude.to_string()),
                ("appid", self.config.api_key.clone()),
                ("units", self.config.units.clone()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::Timeout(self.config.request_timeout)
                } else {
                    RetrievalError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let headers_elapsed = req_start.elapsed();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetrievalError::Transport(format!("Body download error: {}", e)))?;

        if !status.is_success() {
            return Err(RetrievalError::Http {
                status: status.as_u16(),
                message: error_message(status, &bytes),
            });
        }

        let entries = parse_forecast_response(&bytes)?;

        debug!(
            "[OpenWeather #{}] ({:.4}, {:.4}) headers={:?} total={:?} {:.1}KB",
            request_num,
            position.latitude,
            position.longitude,
            headers_elapsed,
            req_start.elapsed(),
            bytes.len() as f64 / 1024.0
        );
        info!(
            "[OpenWeather #{}] {} forecast entries for ({:.4}, {:.4})",
            request_num,
            entries.len(),
            position.latitude,
            position.longitude
        );

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
        "cod": "200",
        "cnt": 2,
        "list": [
            {
                "dt": 1780300800,
                "main": {"temp": 17.4, "feels_like": 16.9, "humidity": 71, "pressure": 1014},
                "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
                "wind": {"speed": 5.2, "deg": 250, "gust": 8.1},
                "rain": {"3h": 0.62},
                "dt_txt": "2026-06-01 08:00:00"
            },
            {
                "dt": 1780311600,
                "main": {"temp": 21.0, "feels_like": 20.6, "humidity": 55, "pressure": 1015},
                "weather": [{"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}],
                "wind": {"speed": 3.1},
                "dt_txt": "2026-06-01 11:00:00"
            }
        ],
        "city": {"name": "Barcelona"}
    }"#;

    #[test]
    fn test_parse_forecast_response() {
        let entries = parse_forecast_response(SAMPLE_RESPONSE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.time, DateTime::<Utc>::from_timestamp(1_780_300_800, 0).unwrap());
        assert_eq!(first.snapshot.temperature, 17.4);
        assert_eq!(first.snapshot.humidity, 71.0);
        assert_eq!(first.snapshot.wind_direction_deg, 250.0);
        assert_eq!(first.snapshot.precipitation_mm, 0.62);
        assert_eq!(first.snapshot.condition_code, 500);
        assert_eq!(first.snapshot.condition, "Rain");
        assert_eq!(first.snapshot.description, "light rain");
    }

    #[test]
    fn test_missing_rain_and_wind_direction_default_to_zero() {
        let entries = parse_forecast_response(SAMPLE_RESPONSE.as_bytes()).unwrap();
        assert_eq!(entries[1].snapshot.precipitation_mm, 0.0);
        assert_eq!(entries[1].snapshot.wind_direction_deg, 0.0);
        assert_eq!(entries[1].snapshot.wind_speed, 3.1);
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let result = parse_forecast_response(b"<html>bad gateway</html>");
        assert!(matches!(result, Err(RetrievalError::Decode(_))));
    }

    #[test]
    fn test_error_message_prefers_api_message() {
        let body = br#"{"cod": 401, "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."}"#;
        let message = error_message(StatusCode::UNAUTHORIZED, body);
        assert!(message.starts_with("Invalid API key"));

        assert_eq!(error_message(StatusCode::BAD_GATEWAY, b""), "Bad Gateway");
    }

    #[test]
    fn test_forecast_url_trims_trailing_slash() {
        let mut config = OpenWeatherConfig::new("key");
        config.base_url = "http://localhost:8080/data/2.5/".to_string();
        let provider = OpenWeatherProvider::new(config).unwrap();
        assert_eq!(provider.forecast_url(), "http://localhost:8080/data/2.5/forecast");
        assert_eq!(provider.request_count(), 0);
    }
}
