//! Shared fixtures for unit tests: a scripted provider and snapshot builders.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::RetrievalError;
use crate::weather::{ForecastEntry, RetrievalConfig, WeatherProvider, WeatherSnapshot};
use crate::GpsPoint;

pub(crate) fn snapshot(temperature: f64) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature,
        feels_like: temperature - 1.0,
        humidity: 60.0,
        pressure: 1013.0,
        wind_speed: 4.0,
        wind_direction_deg: 200.0,
        precipitation_mm: 0.0,
        condition_code: 800,
        condition: "Clear".to_string(),
        description: "clear sky".to_string(),
    }
}

/// `count` entries three hours apart starting at `from`; entry `i` has temperature `i`.
pub(crate) fn entries_every_3h(from: DateTime<Utc>, count: usize) -> Vec<ForecastEntry> {
    (0..count)
        .map(|i| ForecastEntry {
            time: from + ChronoDuration::hours(3 * i as i64),
            snapshot: snapshot(i as f64),
        })
        .collect()
}

/// Retrieval settings that keep retry tests fast.
pub(crate) fn fast_config() -> RetrievalConfig {
    RetrievalConfig {
        retry_delay: Duration::from_millis(1),
        request_timeout: Duration::from_secs(2),
        ..RetrievalConfig::default()
    }
}

pub(crate) struct MockProvider {
    entries: Vec<ForecastEntry>,
    calls: AtomicU32,
    transient_failures: AtomicU32,
    failing_position: Option<GpsPoint>,
    rejection: Option<RetrievalError>,
    delay: Duration,
}

impl MockProvider {
    pub(crate) fn new(entries: Vec<ForecastEntry>) -> Self {
        Self {
            entries,
            calls: AtomicU32::new(0),
            transient_failures: AtomicU32::new(0),
            failing_position: None,
            rejection: None,
            delay: Duration::ZERO,
        }
    }

    /// Fail the next `count` requests with a transport error.
    pub(crate) fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::Relaxed);
        self
    }

    /// Always answer requests for `position` with a 503.
    pub(crate) fn failing_at(mut self, position: GpsPoint) -> Self {
        self.failing_position = Some(position);
        self
    }

    /// Answer every request with `error`.
    pub(crate) fn rejecting_with(mut self, error: RetrievalError) -> Self {
        self.rejection = Some(error);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl WeatherProvider for MockProvider {
    async fn forecast(
        &self,
        position: GpsPoint,
        _time: DateTime<Utc>,
    ) -> Result<Vec<ForecastEntry>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = &self.rejection {
            return Err(error.clone());
        }

        if self.failing_position == Some(position) {
            return Err(RetrievalError::Http {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }

        let remaining = self.transient_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(RetrievalError::Transport("connection reset".to_string()));
        }

        Ok(self.entries.clone())
    }
}
