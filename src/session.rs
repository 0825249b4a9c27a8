//! Forecast session: the state a caller holds between pipeline runs.
//!
//! A session owns the weather service (and therefore the forecast cache) and
//! the currently loaded track. Each run builds a fresh task sequence; changing
//! the track or the parameters never re-resolves old tasks in place.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::executor::{execute_all_with_progress, BatchReport, ForecastWarning, ProgressCallback};
use crate::schedule::{schedule, ForecastTask, ScheduleConfig};
use crate::track::{parse_gpx, ElevationSample, Track};
use crate::weather::{RetrievalConfig, WeatherProvider, WeatherService};
use crate::Bounds;

/// Everything one pipeline run produces for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub start_time: DateTime<Utc>,
    /// Total route length in meters
    pub total_distance: f64,
    pub bounds: Option<Bounds>,
    pub elevation_profile: Vec<ElevationSample>,
    pub tasks: Vec<ForecastTask>,
    pub report: BatchReport,
}

impl ForecastRun {
    pub fn warnings(&self) -> &[ForecastWarning] {
        &self.report.warnings
    }

    /// Temperature at `distance_meters` along the route, linearly interpolated
    /// between the two forecast points around it.
    ///
    /// Before the first forecast point the first temperature is returned, past
    /// the last one the last temperature. `None` when the point used has no
    /// weather.
    pub fn temperature_at(&self, distance_meters: f64) -> Option<f64> {
        let first = self.tasks.first()?;
        if distance_meters < first.distance_from_start {
            return first.weather.snapshot().map(|s| s.temperature);
        }

        let bracket = self.tasks.windows(2).find(|pair| {
            pair[0].distance_from_start <= distance_meters
                && distance_meters <= pair[1].distance_from_start
        });

        let Some(pair) = bracket else {
            return self.tasks.last()?.weather.snapshot().map(|s| s.temperature);
        };

        let t1 = pair[0].weather.snapshot()?.temperature;
        let t2 = pair[1].weather.snapshot()?.temperature;
        let d1 = pair[0].distance_from_start;
        let d2 = pair[1].distance_from_start;
        let ratio = (distance_meters - d1) / (d2 - d1);

        Some(t1 + (t2 - t1) * ratio)
    }
}

pub struct ForecastSession<P> {
    service: WeatherService<P>,
    track: Option<Track>,
}

impl<P: WeatherProvider> ForecastSession<P> {
    pub fn new(provider: P, config: RetrievalConfig) -> Self {
        Self::with_service(WeatherService::new(provider, config))
    }

    pub fn with_service(service: WeatherService<P>) -> Self {
        Self { service, track: None }
    }

    pub fn service(&self) -> &WeatherService<P> {
        &self.service
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Parse GPX text and make it the current track.
    ///
    /// On error the previously loaded track is kept.
    pub fn load_gpx(&mut self, raw: &str) -> Result<&Track> {
        let track = parse_gpx(raw)?;
        self.load_track(track)
    }

    /// Make `track` the current track. A route needs at least two points.
    pub fn load_track(&mut self, track: Track) -> Result<&Track> {
        if track.len() < 2 {
            return Err(Error::TooFewPoints { found: track.len() });
        }

        info!(
            "[Session] Loaded track with {} points ({:.1} km)",
            track.len(),
            track.total_distance() / 1000.0
        );
        Ok(&*self.track.insert(track))
    }

    /// Schedule forecast tasks for the current track without fetching weather.
    pub fn plan(&self, start_time: DateTime<Utc>, config: &ScheduleConfig) -> Result<Vec<ForecastTask>> {
        let track = self.track.as_ref().ok_or(Error::NoTrack)?;
        Ok(schedule(&track.positions(), start_time, config)?)
    }

    /// Schedule tasks and resolve their weather.
    ///
    /// Fails only on track or scheduling errors; weather failures show up as
    /// warnings in the returned run.
    pub async fn run(&self, start_time: DateTime<Utc>, config: &ScheduleConfig) -> Result<ForecastRun> {
        self.run_with_progress(start_time, config, None).await
    }

    pub async fn run_with_progress(
        &self,
        start_time: DateTime<Utc>,
        config: &ScheduleConfig,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ForecastRun> {
        let mut tasks = self.plan(start_time, config)?;
        let track = self.track.as_ref().ok_or(Error::NoTrack)?;

        let report = execute_all_with_progress(&self.service, &mut tasks, on_progress).await;

        Ok(ForecastRun {
            start_time,
            total_distance: track.total_distance(),
            bounds: track.bounds(),
            elevation_profile: track.elevation_profile(),
            tasks,
            report,
        })
    }

    /// Drop every cached forecast, so the next run goes back to the provider.
    pub async fn clear_cache(&self) {
        self.service.cache().clear().await;
    }
}
