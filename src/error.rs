//! Error types for the forecast pipeline.
//!
//! Ingestion and scheduling errors are fatal to a run and surface through
//! [`Error`]. Retrieval errors stay local to one forecast task: they are
//! retried, then recorded on the task as a failed weather slot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failure while reading a GPX track.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("Invalid GPX file format: {0}")]
    Format(String),

    #[error("No track points found in GPX file")]
    Empty,
}

/// Failure while turning a track into forecast tasks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("Invalid route distance")]
    InvalidRoute,

    #[error("Invalid start time: {0}")]
    InvalidStartTime(String),

    #[error("No forecast times available within the forecast horizon. Adjust your route or parameters.")]
    NoReachableForecasts,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Failure while retrieving weather for a single forecast task.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RetrievalError {
    #[error("Forecast time {requested} exceeds the forecast limit {limit}")]
    HorizonExceeded {
        requested: DateTime<Utc>,
        limit: DateTime<Utc>,
    },

    #[error("API Error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request error: {0}")]
    Transport(String),

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Provider returned no forecast entries")]
    NoEntries,
}

impl RetrievalError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Horizon violations, empty answers and client errors other than 408 and
    /// 429 are deterministic. Consulted only when
    /// [`RetrievalConfig::retry_transient_only`](crate::RetrievalConfig) is set.
    pub fn is_retryable(&self) -> bool {
        match self {
            RetrievalError::HorizonExceeded { .. } | RetrievalError::NoEntries => false,
            RetrievalError::Http { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            RetrievalError::Timeout(_)
            | RetrievalError::Transport(_)
            | RetrievalError::Decode(_) => true,
        }
    }
}

/// Fatal pipeline error: nothing is produced for the run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("A route needs at least 2 track points, found {found}")]
    TooFewPoints { found: usize },

    #[error("No track loaded")]
    NoTrack,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
