//! # Route Forecast
//!
//! Weather forecasts along a GPS route, at the time you are expected to pass
//! each point.
//!
//! This library provides:
//! - GPX track ingestion with elevation profiles
//! - Distance-based sampling of forecast points with estimated arrival times
//! - Concurrent, cached, retrying weather retrieval behind a swappable provider
//!
//! ## Features
//!
//! - **`http`** (default) - OpenWeatherMap client for live forecasts
//! - **`cli`** - The `route-forecast` command-line binary
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use route_forecast::{schedule, GpsPoint, ScheduleConfig};
//!
//! let route = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.0, 1.0)];
//! let start = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
//!
//! let config = ScheduleConfig {
//!     interval_meters: 50_000.0,
//!     speed_meters_per_hour: 20_000.0,
//!     ..ScheduleConfig::default()
//! };
//!
//! let tasks = schedule(&route, start, &config).unwrap();
//! for task in &tasks {
//!     println!("{:.0}m at {}", task.distance_from_start, task.scheduled_time);
//! }
//! assert_eq!(tasks.len(), 4);
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result, RetrievalError, ScheduleError, TrackError};

pub mod geo_utils;

pub mod track;
pub use track::{parse_gpx, parse_gpx_reader, ElevationSample, Track, TrackPoint};

pub mod schedule;
pub use schedule::{parse_start_time, schedule, ForecastTask, ScheduleConfig, WeatherSlot};

pub mod weather;
pub use weather::{
    select_nearest, CacheKey, ForecastCache, ForecastEntry, RetrievalConfig, WeatherProvider,
    WeatherService, WeatherSnapshot,
};

pub mod executor;
pub use executor::{execute_all, execute_all_with_progress, BatchReport, ForecastWarning, ProgressCallback};

pub mod session;
pub use session::{ForecastRun, ForecastSession};

// HTTP module for forecast fetching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{OpenWeatherConfig, OpenWeatherProvider};

#[cfg(test)]
mod testing;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_forecast::GpsPoint;
/// let point = GpsPoint::new(41.3851, 2.1734); // Barcelona
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
