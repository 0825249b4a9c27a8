//! Weather retrieval for forecast tasks.
//!
//! [`WeatherService`] wraps a [`WeatherProvider`] with:
//! - Memoization keyed on rounded position and hour of day
//! - A hard per-request timeout
//! - Fixed-delay retry with a bounded budget
//! - Nearest-in-time selection from the provider's forecast list

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::RetrievalError;
use crate::GpsPoint;

const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Weather conditions at one place and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Air temperature in °C
    pub temperature: f64,
    /// Perceived temperature in °C
    pub feels_like: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Sea-level pressure in hPa
    pub pressure: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Meteorological wind direction (where the wind comes from), degrees
    pub wind_direction_deg: f64,
    /// Precipitation over the forecast period in mm
    pub precipitation_mm: f64,
    /// Provider condition id (e.g. 500 for light rain)
    pub condition_code: u32,
    /// Condition group (e.g. "Rain", "Clouds")
    pub condition: String,
    /// Human readable condition (e.g. "light rain")
    pub description: String,
}

impl WeatherSnapshot {
    /// 8-point compass label for the wind direction.
    pub fn wind_compass(&self) -> &'static str {
        let index = (self.wind_direction_deg.rem_euclid(360.0) / 45.0).round() as usize % 8;
        COMPASS_POINTS[index]
    }

    /// Bearing the wind blows towards, for drawing arrows on a map.
    pub fn wind_arrow_bearing(&self) -> f64 {
        (self.wind_direction_deg + 180.0).rem_euclid(360.0)
    }
}

/// One element of a provider's forecast list.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub snapshot: WeatherSnapshot,
}

/// A source of point forecasts.
///
/// Implementations return the provider's whole forecast list for a position;
/// [`WeatherService`] picks the entry nearest to the requested time.
pub trait WeatherProvider {
    fn forecast(
        &self,
        position: GpsPoint,
        time: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ForecastEntry>, RetrievalError>> + Send;
}

/// Configuration for weather retrieval.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Retries after the first failed attempt.
    /// Default: 2
    pub max_retries: u32,

    /// Fixed wait between attempts.
    /// Default: 1 second
    pub retry_delay: Duration,

    /// Hard limit on a single provider request.
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Furthest look-ahead the provider can answer, counted from now.
    /// Default: 5 days
    pub horizon: ChronoDuration,

    /// Only retry failures that [`RetrievalError::is_retryable`] reports as
    /// transient. When false every failure uses the retry budget.
    /// Default: false
    pub retry_transient_only: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            horizon: ChronoDuration::days(5),
            retry_transient_only: false,
        }
    }
}

/// Cache key: position rounded to 4 decimals (~11 m) and hour of day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_e4: i64,
    lon_e4: i64,
    hour: u32,
}

impl CacheKey {
    pub fn new(position: GpsPoint, time: DateTime<Utc>) -> Self {
        Self {
            lat_e4: (position.latitude * 10_000.0).round() as i64,
            lon_e4: (position.longitude * 10_000.0).round() as i64,
            hour: time.hour(),
        }
    }
}

/// Session-lifetime memo of successful lookups. Failures are never stored.
#[derive(Debug, Default)]
pub struct ForecastCache {
    entries: Mutex<HashMap<CacheKey, WeatherSnapshot>>,
    hits: AtomicU32,
    misses: AtomicU32,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<WeatherSnapshot> {
        let found = self.entries.lock().await.get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub async fn insert(&self, key: CacheKey, snapshot: WeatherSnapshot) {
        self.entries.lock().await.insert(key, snapshot);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u32 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Pick the entry closest in time to `time`. Ties go to the earlier entry in the list.
pub fn select_nearest(entries: &[ForecastEntry], time: DateTime<Utc>) -> Option<&ForecastEntry> {
    let mut best: Option<(&ForecastEntry, i64)> = None;

    for entry in entries {
        let diff = (entry.time - time).num_milliseconds().abs();
        match best {
            Some((_, best_diff)) if best_diff <= diff => {}
            _ => best = Some((entry, diff)),
        }
    }

    best.map(|(entry, _)| entry)
}

/// Cached, retrying weather lookups on top of a [`WeatherProvider`].
pub struct WeatherService<P> {
    provider: P,
    config: RetrievalConfig,
    cache: ForecastCache,
}

impl<P: WeatherProvider> WeatherService<P> {
    pub fn new(provider: P, config: RetrievalConfig) -> Self {
        Self {
            provider,
            config,
            cache: ForecastCache::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn cache(&self) -> &ForecastCache {
        &self.cache
    }

    /// Weather at `position` for `time`, retrying failed attempts.
    ///
    /// Each attempt goes through [`cached_fetch`](Self::cached_fetch). After a
    /// failure the service waits `retry_delay` and tries again until
    /// `max_retries` is used up, then returns the last failure. With
    /// `retry_transient_only` set, non-retryable failures return at once.
    pub async fn fetch_with_retry(
        &self,
        position: GpsPoint,
        time: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, RetrievalError> {
        let mut retries_left = self.config.max_retries;

        loop {
            match self.cached_fetch(position, time).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if retries_left > 0 && self.should_retry(&err) => {
                    retries_left -= 1;
                    warn!(
                        "[WeatherService] ({:.4}, {:.4}) @ {}: {}, retrying in {:?} ({} left)",
                        position.latitude, position.longitude, time, err,
                        self.config.retry_delay, retries_left
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn should_retry(&self, err: &RetrievalError) -> bool {
        !self.config.retry_transient_only || err.is_retryable()
    }

    /// Weather from the cache, or from the provider on a miss.
    ///
    /// Successful lookups are stored; failures are returned without touching
    /// the cache so a later attempt goes back to the network.
    pub async fn cached_fetch(
        &self,
        position: GpsPoint,
        time: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, RetrievalError> {
        let key = CacheKey::new(position, time);
        if let Some(snapshot) = self.cache.get(&key).await {
            debug!("[WeatherService] Cache hit for {:?}", key);
            return Ok(snapshot);
        }

        let snapshot = self.remote_fetch(position, time).await?;
        self.cache.insert(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// One provider request, bounded by `request_timeout`.
    ///
    /// Times past `now + horizon` fail with [`RetrievalError::HorizonExceeded`]
    /// before any request is made.
    pub async fn remote_fetch(
        &self,
        position: GpsPoint,
        time: DateTime<Utc>,
    ) -> Result<WeatherSnapshot, RetrievalError> {
        let limit = Utc::now()
            .checked_add_signed(self.config.horizon)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if time > limit {
            return Err(RetrievalError::HorizonExceeded { requested: time, limit });
        }

        let request = self.provider.forecast(position, time);
        let entries = match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(result) => result?,
            Err(_) => return Err(RetrievalError::Timeout(self.config.request_timeout)),
        };

        select_nearest(&entries, time)
            .map(|entry| entry.snapshot.clone())
            .ok_or(RetrievalError::NoEntries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entries_every_3h, fast_config, snapshot, MockProvider};

    fn now_on_the_hour() -> DateTime<Utc> {
        let now = Utc::now();
        now - ChronoDuration::seconds(now.minute() as i64 * 60 + now.second() as i64)
    }

    #[test]
    fn test_wind_compass() {
        let mut s = snapshot(10.0);
        for (deg, expected) in [(0.0, "N"), (44.0, "NE"), (180.0, "S"), (350.0, "N"), (-90.0, "W")] {
            s.wind_direction_deg = deg;
            assert_eq!(s.wind_compass(), expected, "{} degrees", deg);
        }
    }

    #[test]
    fn test_wind_arrow_bearing() {
        let mut s = snapshot(10.0);
        s.wind_direction_deg = 270.0;
        assert_eq!(s.wind_arrow_bearing(), 90.0);
    }

    #[test]
    fn test_cache_key_rounds_to_four_decimals() {
        let t = now_on_the_hour();
        let a = CacheKey::new(GpsPoint::new(41.38512, 2.17341), t);
        let b = CacheKey::new(GpsPoint::new(41.38514, 2.17339), t);
        let c = CacheKey::new(GpsPoint::new(41.38516, 2.17341), t);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, CacheKey::new(GpsPoint::new(41.38512, 2.17341), t + ChronoDuration::hours(1)));
    }

    #[test]
    fn test_select_nearest() {
        let base = now_on_the_hour();
        let entries = entries_every_3h(base, 8);

        let picked = select_nearest(&entries, base + ChronoDuration::minutes(250)).unwrap();
        assert_eq!(picked.time, base + ChronoDuration::hours(3));

        let picked = select_nearest(&entries, base + ChronoDuration::hours(100)).unwrap();
        assert_eq!(picked.time, base + ChronoDuration::hours(21));

        assert!(select_nearest(&[], base).is_none());
    }

    #[test]
    fn test_select_nearest_tie_goes_to_first() {
        let base = now_on_the_hour();
        let entries = entries_every_3h(base, 2);
        let midpoint = base + ChronoDuration::minutes(90);
        assert_eq!(select_nearest(&entries, midpoint).unwrap().time, base);
    }

    #[tokio::test]
    async fn test_remote_fetch_picks_nearest_entry() {
        let base = now_on_the_hour();
        let service = WeatherService::new(MockProvider::new(entries_every_3h(base, 40)), fast_config());

        let weather = service
            .remote_fetch(GpsPoint::new(41.0, 2.0), base + ChronoDuration::hours(7))
            .await
            .unwrap();
        // Entries carry their index as temperature; 6h is entry 2
        assert_eq!(weather.temperature, 2.0);
    }

    #[tokio::test]
    async fn test_cached_fetch_hits_network_once_per_key() {
        let base = now_on_the_hour();
        let service = WeatherService::new(MockProvider::new(entries_every_3h(base, 40)), fast_config());

        let first = service.cached_fetch(GpsPoint::new(41.38512, 2.17341), base).await.unwrap();
        let second = service.cached_fetch(GpsPoint::new(41.38514, 2.17339), base).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.provider().calls(), 1);
        assert_eq!(service.cache().hits(), 1);
        assert_eq!(service.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_cached_fetch_separates_hours() {
        let base = now_on_the_hour();
        let service = WeatherService::new(MockProvider::new(entries_every_3h(base, 40)), fast_config());
        let position = GpsPoint::new(41.3851, 2.1734);

        service.cached_fetch(position, base).await.unwrap();
        service.cached_fetch(position, base + ChronoDuration::hours(1)).await.unwrap();

        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let base = now_on_the_hour();
        let provider = MockProvider::new(entries_every_3h(base, 40)).with_transient_failures(1);
        let service = WeatherService::new(provider, fast_config());
        let position = GpsPoint::new(41.3851, 2.1734);

        assert!(service.cached_fetch(position, base).await.is_err());
        assert!(service.cache().is_empty().await);

        assert!(service.cached_fetch(position, base).await.is_ok());
        assert!(service.cached_fetch(position, base).await.is_ok());
        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_one_transient_failure() {
        let base = now_on_the_hour();
        let provider = MockProvider::new(entries_every_3h(base, 40)).with_transient_failures(1);
        let config = RetrievalConfig { max_retries: 1, ..fast_config() };
        let service = WeatherService::new(provider, config);

        let result = service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), base).await;
        assert!(result.is_ok());
        assert_eq!(service.provider().calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_returns_last_error() {
        let base = now_on_the_hour();
        let provider = MockProvider::new(entries_every_3h(base, 40)).with_transient_failures(10);
        let service = WeatherService::new(provider, fast_config());

        let result = service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), base).await;
        assert!(matches!(result, Err(RetrievalError::Transport(_))));
        // First attempt plus two retries
        assert_eq!(service.provider().calls(), 3);
    }

    #[tokio::test]
    async fn test_horizon_exceeded_makes_no_request() {
        let base = now_on_the_hour();
        let service = WeatherService::new(MockProvider::new(entries_every_3h(base, 40)), fast_config());

        let result = service
            .fetch_with_retry(GpsPoint::new(41.3851, 2.1734), Utc::now() + ChronoDuration::days(6))
            .await;
        assert!(matches!(result, Err(RetrievalError::HorizonExceeded { .. })));
        assert_eq!(service.provider().calls(), 0);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let base = now_on_the_hour();
        let provider = MockProvider::new(entries_every_3h(base, 40)).with_delay(Duration::from_millis(500));
        let config = RetrievalConfig {
            max_retries: 0,
            request_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let service = WeatherService::new(provider, config);

        let result = service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), base).await;
        assert_eq!(result, Err(RetrievalError::Timeout(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn test_empty_forecast_list_is_no_entries() {
        let service = WeatherService::new(MockProvider::new(Vec::new()), fast_config());
        let result = service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), Utc::now()).await;
        assert_eq!(result, Err(RetrievalError::NoEntries));
        // First attempt plus two retries
        assert_eq!(service.provider().calls(), 3);
    }

    #[tokio::test]
    async fn test_client_error_uses_full_retry_budget() {
        let rejected = RetrievalError::Http { status: 401, message: "bad key".to_string() };
        let provider = MockProvider::new(Vec::new()).rejecting_with(rejected.clone());
        let service = WeatherService::new(provider, fast_config());

        let result = service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), Utc::now()).await;
        assert_eq!(result, Err(rejected));
        assert_eq!(service.provider().calls(), 1 + RetrievalConfig::default().max_retries);
    }

    #[tokio::test]
    async fn test_transient_only_returns_client_error_at_once() {
        let rejected = RetrievalError::Http { status: 401, message: "bad key".to_string() };
        let provider = MockProvider::new(Vec::new()).rejecting_with(rejected.clone());
        let config = RetrievalConfig { retry_transient_only: true, ..fast_config() };
        let service = WeatherService::new(provider, config);

        let result = service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), Utc::now()).await;
        assert_eq!(result, Err(rejected));
        assert_eq!(service.provider().calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_only_still_retries_server_errors() {
        let base = now_on_the_hour();
        let provider = MockProvider::new(entries_every_3h(base, 40)).with_transient_failures(2);
        let config = RetrievalConfig { retry_transient_only: true, ..fast_config() };
        let service = WeatherService::new(provider, config);

        assert!(service.fetch_with_retry(GpsPoint::new(41.3851, 2.1734), base).await.is_ok());
        assert_eq!(service.provider().calls(), 3);
    }

    #[tokio::test]
    async fn test_cache_clear_resets_counters() {
        let base = now_on_the_hour();
        let service = WeatherService::new(MockProvider::new(entries_every_3h(base, 40)), fast_config());
        service.cached_fetch(GpsPoint::new(41.0, 2.0), base).await.unwrap();
        service.cache().clear().await;

        assert!(service.cache().is_empty().await);
        assert_eq!(service.cache().misses(), 0);
    }
}
