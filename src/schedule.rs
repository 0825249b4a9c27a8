//! Forecast task scheduling.
//!
//! A route is sampled every `interval_meters` from the start, plus one final
//! sample at the end of the route. Each sample gets the time a traveller
//! moving at a constant speed would reach it. Sampling by distance rather
//! than by time keeps marker density tied to the route geometry.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::Serialize;

use crate::error::{RetrievalError, ScheduleError};
use crate::geo_utils::{interpolate, polyline_length};
use crate::weather::WeatherSnapshot;
use crate::GpsPoint;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Configuration for forecast sampling along a route.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Distance between forecast samples in meters.
    /// Default: 5000.0 (5 km)
    pub interval_meters: f64,

    /// Average travel speed in meters per hour.
    /// Default: 20000.0 (20 km/h)
    pub speed_meters_per_hour: f64,

    /// Furthest look-ahead the forecast provider supports, counted from the
    /// start time. Samples reached later than this are dropped.
    /// Default: 5 days
    pub horizon: Duration,

    /// Upper bound on samples per route, so a tiny interval on a long route
    /// is rejected instead of flooding the provider.
    /// Default: 10000
    pub max_samples: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_meters: 5_000.0,
            speed_meters_per_hour: 20_000.0,
            horizon: Duration::days(5),
            max_samples: 10_000,
        }
    }
}

impl ScheduleConfig {
    /// Build a config from the units people usually think in.
    pub fn from_km(interval_km: f64, speed_kmh: f64) -> Self {
        Self {
            interval_meters: interval_km * 1000.0,
            speed_meters_per_hour: speed_kmh * 1000.0,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        if !(self.interval_meters.is_finite() && self.interval_meters > 0.0) {
            return Err(ScheduleError::InvalidParameter(format!(
                "sampling interval must be a positive distance, got {}",
                self.interval_meters
            )));
        }
        if !(self.speed_meters_per_hour.is_finite() && self.speed_meters_per_hour > 0.0) {
            return Err(ScheduleError::InvalidParameter(format!(
                "average speed must be positive, got {}",
                self.speed_meters_per_hour
            )));
        }
        Ok(())
    }
}

/// Weather state of a single forecast task.
///
/// Starts `Pending` and moves exactly once to `Resolved` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum WeatherSlot {
    Pending,
    Resolved(WeatherSnapshot),
    Failed(RetrievalError),
}

impl WeatherSlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, WeatherSlot::Pending)
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            WeatherSlot::Resolved(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RetrievalError> {
        match self {
            WeatherSlot::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// One point on the route awaiting (or holding) a weather forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastTask {
    /// Position in route order, starting at 0
    pub index: usize,
    pub position: GpsPoint,
    /// Meters along the route from the start
    pub distance_from_start: f64,
    /// Estimated arrival time at this position
    pub scheduled_time: DateTime<Utc>,
    pub weather: WeatherSlot,
}

impl ForecastTask {
    pub fn new(
        index: usize,
        position: GpsPoint,
        distance_from_start: f64,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            index,
            position,
            distance_from_start,
            scheduled_time,
            weather: WeatherSlot::Pending,
        }
    }
}

/// Turn a route into an ordered sequence of forecast tasks.
///
/// Samples sit at `i * interval_meters` for `i = 0..=ceil(D / interval)`, the
/// last one clamped to the route length `D`. Each is placed on the route with
/// [`interpolate`] and timed at `start_time + distance / speed`. Samples later
/// than `start_time + horizon` are dropped.
///
/// # Errors
///
/// - [`ScheduleError::InvalidParameter`] for a non-positive interval or speed,
///   or an interval too small for the route
/// - [`ScheduleError::InvalidRoute`] when the route has no length
/// - [`ScheduleError::InvalidStartTime`] when `start_time + horizon` is not a
///   representable instant
/// - [`ScheduleError::NoReachableForecasts`] when no sample falls inside the
///   horizon
pub fn schedule(
    points: &[GpsPoint],
    start_time: DateTime<Utc>,
    config: &ScheduleConfig,
) -> Result<Vec<ForecastTask>, ScheduleError> {
    config.validate()?;

    let total_distance = polyline_length(points);
    if !(total_distance.is_finite() && total_distance > 0.0) {
        return Err(ScheduleError::InvalidRoute);
    }

    let horizon_end = start_time
        .checked_add_signed(config.horizon)
        .ok_or_else(|| ScheduleError::InvalidStartTime(format!("{} is out of range", start_time)))?;
    let horizon_hours = config.horizon.num_milliseconds() as f64 / MILLIS_PER_HOUR;

    let sample_count = (total_distance / config.interval_meters).ceil();
    if sample_count >= config.max_samples as f64 {
        return Err(ScheduleError::InvalidParameter(format!(
            "a {:.0}m interval gives {} samples on a {:.0}m route (limit {})",
            config.interval_meters, sample_count, total_distance, config.max_samples
        )));
    }
    let sample_count = sample_count as usize;

    let mut tasks: Vec<ForecastTask> = Vec::new();
    for i in 0..=sample_count {
        let distance = (i as f64 * config.interval_meters).min(total_distance);
        if tasks.last().is_some_and(|prev| distance <= prev.distance_from_start) {
            continue;
        }

        // Arrival times grow with distance, so nothing after this is reachable either
        let offset_hours = distance / config.speed_meters_per_hour;
        if offset_hours > horizon_hours {
            break;
        }
        let scheduled_time =
            start_time + Duration::milliseconds((offset_hours * MILLIS_PER_HOUR).round() as i64);
        if scheduled_time > horizon_end {
            break;
        }

        let fraction = (distance / total_distance).min(1.0);
        tasks.push(ForecastTask::new(
            tasks.len(),
            interpolate(points, fraction),
            distance,
            scheduled_time,
        ));
    }

    if tasks.is_empty() {
        return Err(ScheduleError::NoReachableForecasts);
    }

    debug!(
        "[Schedule] {} tasks over {:.0}m (interval {:.0}m, speed {:.0}m/h, {} dropped)",
        tasks.len(),
        total_distance,
        config.interval_meters,
        config.speed_meters_per_hour,
        sample_count + 1 - tasks.len()
    );

    Ok(tasks)
}

/// Parse a user-supplied start time.
///
/// Accepts RFC 3339 (`2026-06-01T08:00:00+02:00`) or a bare local-style
/// timestamp (`2026-06-01T08:00`, seconds optional) which is taken as UTC.
pub fn parse_start_time(input: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let input = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ScheduleError::InvalidStartTime(format!("cannot parse '{}'", input)))
}
