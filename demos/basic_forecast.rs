//! Basic example of forecasting weather along a route, offline.
//!
//! A synthetic provider stands in for OpenWeatherMap so no API key is needed.
//!
//! Run with: cargo run --example basic_forecast

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use route_forecast::{
    ForecastEntry, ForecastSession, GpsPoint, RetrievalConfig, RetrievalError, ScheduleConfig,
    WeatherProvider, WeatherSnapshot,
};

const ROUTE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="basic_forecast" xmlns="http://www.topografix.com/GPX/1/1">
<trk><name>Barcelona to Montserrat</name><trkseg>
  <trkpt lat="41.3851" lon="2.1734"><ele>12</ele></trkpt>
  <trkpt lat="41.4300" lon="2.0500"><ele>95</ele></trkpt>
  <trkpt lat="41.4900" lon="1.9300"><ele>240</ele></trkpt>
  <trkpt lat="41.5500" lon="1.8500"><ele>410</ele></trkpt>
  <trkpt lat="41.5930" lon="1.8370"><ele>720</ele></trkpt>
</trkseg></trk>
</gpx>"#;

/// Three-hourly forecasts that warm up towards mid-afternoon and cool with latitude.
struct SyntheticProvider;

impl WeatherProvider for SyntheticProvider {
    async fn forecast(
        &self,
        position: GpsPoint,
        time: DateTime<Utc>,
    ) -> Result<Vec<ForecastEntry>, RetrievalError> {
        let first = time - ChronoDuration::hours(time.hour() as i64 % 3);

        Ok((0..40)
            .map(|i| {
                let at = first + ChronoDuration::hours(3 * i);
                let daytime = 1.0 - ((at.hour() as f64 - 15.0).abs() / 12.0);
                ForecastEntry {
                    time: at,
                    snapshot: WeatherSnapshot {
                        temperature: 14.0 + 8.0 * daytime - (position.latitude - 41.0) * 4.0,
                        feels_like: 13.0 + 8.0 * daytime,
                        humidity: 65.0,
                        pressure: 1016.0,
                        wind_speed: 3.5,
                        wind_direction_deg: 220.0,
                        precipitation_mm: 0.0,
                        condition_code: 800,
                        condition: "Clear".to_string(),
                        description: "clear sky".to_string(),
                    },
                }
            })
            .collect())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut session = ForecastSession::new(SyntheticProvider, RetrievalConfig::default());
    let track = session.load_gpx(ROUTE_GPX).expect("valid GPX");
    println!("Loaded {} points, {:.1} km\n", track.len(), track.total_distance() / 1000.0);

    let config = ScheduleConfig::from_km(10.0, 18.0);
    let run = session
        .run(Utc::now(), &config)
        .await
        .expect("route can be scheduled");

    for task in &run.tasks {
        match task.weather.snapshot() {
            Some(w) => println!(
                "{}  {:>5.1} km  {:>4.1}°C  {} wind {:.0} m/s",
                task.scheduled_time.format("%H:%M"),
                task.distance_from_start / 1000.0,
                w.temperature,
                w.wind_compass(),
                w.wind_speed
            ),
            None => println!("{}  no data", task.scheduled_time.format("%H:%M")),
        }
    }

    println!("\nElevation profile:");
    for sample in &run.elevation_profile {
        let temperature = run
            .temperature_at(sample.distance_meters)
            .map_or("n/a".to_string(), |t| format!("{:.1}°C", t));
        println!(
            "  {:>5.1} km  {:>4.0} m  {}",
            sample.distance_meters / 1000.0,
            sample.elevation_meters,
            temperature
        );
    }
}
