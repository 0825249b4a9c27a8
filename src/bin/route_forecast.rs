//! Command-line front end: print the weather along a GPX route.
//!
//! Run with: cargo run --features cli -- ride.gpx --start 2026-06-01T08:00

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use log::warn;
use route_forecast::{
    parse_start_time, ForecastRun, ForecastSession, OpenWeatherConfig, OpenWeatherProvider,
    RetrievalConfig, ScheduleConfig, WeatherSlot,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(about = "Weather forecasts along a GPX route, at the time you get there.")]
struct Cli {
    /// GPX file with the route
    gpx: PathBuf,
    /// Distance between forecast points, in km
    #[arg(long, default_value_t = 5.0)]
    interval_km: f64,
    /// Average travel speed, in km/h
    #[arg(long, default_value_t = 20.0)]
    speed_kmh: f64,
    /// Departure time, RFC 3339 or YYYY-MM-DDTHH:MM (UTC). Defaults to now
    #[arg(long)]
    start: Option<String>,
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Override the OpenWeatherMap API root
    #[arg(long, env = "OPENWEATHER_BASE_URL")]
    base_url: Option<String>,
    /// Retries per forecast point after the first failure
    #[arg(long, default_value_t = 2)]
    retries: u32,
    #[arg(long, default_value_t = 1000)]
    retry_delay_ms: u64,
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// Print the full run as JSON instead of a timeline
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let start_time = match cli.start.as_deref() {
        Some(raw) => parse_start_time(raw)?,
        None => Utc::now(),
    };

    let request_timeout = Duration::from_secs(cli.timeout_secs);
    let mut provider_config = OpenWeatherConfig::new(cli.api_key);
    provider_config.request_timeout = request_timeout;
    if let Some(base_url) = cli.base_url {
        provider_config.base_url = base_url;
    }

    let retrieval = RetrievalConfig {
        max_retries: cli.retries,
        retry_delay: Duration::from_millis(cli.retry_delay_ms),
        request_timeout,
        ..RetrievalConfig::default()
    };
    let mut session = ForecastSession::new(OpenWeatherProvider::new(provider_config)?, retrieval);

    let raw = std::fs::read_to_string(&cli.gpx)
        .with_context(|| format!("Failed to read {}", cli.gpx.display()))?;
    session.load_gpx(&raw)?;

    let schedule = ScheduleConfig::from_km(cli.interval_km, cli.speed_kmh);
    let run = session.run(start_time, &schedule).await?;

    for warning in run.warnings() {
        warn!("{}: {}", warning.message, warning.error);
        eprintln!("Warning: {}", warning.message);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_timeline(&run);
    }

    Ok(())
}

fn print_timeline(run: &ForecastRun) {
    println!(
        "Route: {:.1} km, {} forecast points, departing {}",
        run.total_distance / 1000.0,
        run.tasks.len(),
        run.start_time.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(center) = run.bounds.map(|b| b.center()) {
        println!("Centered at {:.4}, {:.4}", center.latitude, center.longitude);
    }
    println!();

    for task in &run.tasks {
        let time = task.scheduled_time.format("%a %H:%M");
        let km = task.distance_from_start / 1000.0;

        match &task.weather {
            WeatherSlot::Resolved(w) => println!(
                "{}  {:>6.1} km  {:>5.1}°C (feels {:.0}°C)  {:<18} wind {:.0} m/s {:<2}  rain {:.1} mm",
                time,
                km,
                w.temperature,
                w.feels_like,
                w.description,
                w.wind_speed,
                w.wind_compass(),
                w.precipitation_mm
            ),
            WeatherSlot::Failed(_) | WeatherSlot::Pending => {
                println!("{}  {:>6.1} km  No data", time, km)
            }
        }
    }
}
