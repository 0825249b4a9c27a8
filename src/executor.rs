//! Forecast batch execution.
//!
//! All pending tasks are fetched at once on the current async task. Each
//! lookup settles on its own: one point running out of retries never cancels
//! or delays the others. Results are joined back by task index, whatever order
//! the requests complete in.

use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::RetrievalError;
use crate::schedule::{ForecastTask, WeatherSlot};
use crate::weather::{WeatherProvider, WeatherService};
use crate::GpsPoint;

/// Progress callback type, called with `(completed, total)`
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Non-fatal notice that one forecast point has no weather.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastWarning {
    pub index: usize,
    pub position: GpsPoint,
    pub message: String,
    pub error: RetrievalError,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub resolved: usize,
    pub failed: usize,
    pub warnings: Vec<ForecastWarning>,
}

impl BatchReport {
    /// True when every task in the batch got weather.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Resolve weather for every pending task in place.
///
/// Never fails: tasks whose lookup fails end up [`WeatherSlot::Failed`] and
/// are listed in the report's warnings.
pub async fn execute_all<P: WeatherProvider>(
    service: &WeatherService<P>,
    tasks: &mut [ForecastTask],
) -> BatchReport {
    execute_all_with_progress(service, tasks, None).await
}

/// [`execute_all`] with a callback fired as each lookup settles.
pub async fn execute_all_with_progress<P: WeatherProvider>(
    service: &WeatherService<P>,
    tasks: &mut [ForecastTask],
    on_progress: Option<ProgressCallback>,
) -> BatchReport {
    let total = tasks.iter().filter(|t| t.weather.is_pending()).count() as u32;
    let completed = AtomicU32::new(0);
    let start = Instant::now();

    info!("[Executor] Fetching weather for {} forecast points", total);

    let lookups = tasks
        .iter()
        .filter(|task| task.weather.is_pending())
        .map(|task| {
            let completed = &completed;
            let callback = on_progress.as_ref();
            let (position, time) = (task.position, task.scheduled_time);

            async move {
                let result = service.fetch_with_retry(position, time).await;

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = callback {
                    cb(done, total);
                }

                result
            }
        });
    let results = join_all(lookups).await;

    let mut report = BatchReport::default();
    let pending = tasks.iter_mut().filter(|task| task.weather.is_pending());

    for (task, result) in pending.zip(results) {
        match result {
            Ok(snapshot) => {
                task.weather = WeatherSlot::Resolved(snapshot);
                report.resolved += 1;
            }
            Err(err) => {
                let message = format!("Failed to get weather for point {}", task.index + 1);
                warn!("[Executor] {}: {}", message, err);

                report.warnings.push(ForecastWarning {
                    index: task.index,
                    position: task.position,
                    message,
                    error: err.clone(),
                });
                task.weather = WeatherSlot::Failed(err);
                report.failed += 1;
            }
        }
    }

    info!(
        "[Executor] DONE: {}/{} resolved ({} failed) in {:.2}s, cache {} hits / {} misses",
        report.resolved,
        total,
        report.failed,
        start.elapsed().as_secs_f64(),
        service.cache().hits(),
        service.cache().misses()
    );

    report
}
