//! GPX track ingestion.
//!
//! Reads every `trkpt` of every track segment, in document order, into a
//! [`Track`]. Route and waypoint elements are ignored.

use log::debug;
use serde::Serialize;
use std::io::{Cursor, Read};

use crate::error::TrackError;
use crate::geo_utils::{compute_bounds, cumulative_distances, polyline_length};
use crate::{Bounds, GpsPoint};

/// A single point of a parsed track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters, when the file records one
    pub elevation: Option<f64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, elevation: Option<f64>) -> Self {
        Self { latitude, longitude, elevation }
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Distance along the route paired with the elevation recorded there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElevationSample {
    pub distance_meters: f64,
    pub elevation_meters: f64,
}

/// An ordered, immutable sequence of track points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latitude/longitude of every point, in track order.
    pub fn positions(&self) -> Vec<GpsPoint> {
        self.points.iter().map(TrackPoint::position).collect()
    }

    /// Total route length in meters.
    pub fn total_distance(&self) -> f64 {
        polyline_length(&self.positions())
    }

    /// Distance-vs-elevation pairs for the points that carry an elevation.
    pub fn elevation_profile(&self) -> Vec<ElevationSample> {
        let distances = cumulative_distances(&self.positions());

        self.points
            .iter()
            .zip(distances)
            .filter_map(|(point, distance)| {
                point.elevation.map(|elevation| ElevationSample {
                    distance_meters: distance,
                    elevation_meters: elevation,
                })
            })
            .collect()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        compute_bounds(&self.positions())
    }
}

/// Parse GPX text into a [`Track`].
///
/// Fails with [`TrackError::Format`] when the document is not valid GPX or a
/// point carries a coordinate that is not a finite, in-range number, and with
/// [`TrackError::Empty`] when it contains no track points at all.
pub fn parse_gpx(raw: &str) -> Result<Track, TrackError> {
    parse_gpx_reader(Cursor::new(raw.as_bytes()))
}

/// Parse GPX from any reader. See [`parse_gpx`].
pub fn parse_gpx_reader<R: Read>(reader: R) -> Result<Track, TrackError> {
    let gpx = gpx::read(reader).map_err(|e| TrackError::Format(e.to_string()))?;

    let mut points = Vec::new();
    for track in &gpx.tracks {
        for segment in &track.segments {
            for waypoint in &segment.points {
                let geo_point = waypoint.point();
                let point = TrackPoint::new(geo_point.y(), geo_point.x(), waypoint.elevation);

                if !point.position().is_valid() {
                    return Err(TrackError::Format(format!(
                        "track point {} has invalid coordinates ({}, {})",
                        points.len() + 1,
                        point.latitude,
                        point.longitude
                    )));
                }
                if point.elevation.is_some_and(|e| !e.is_finite()) {
                    return Err(TrackError::Format(format!(
                        "track point {} has an invalid elevation",
                        points.len() + 1
                    )));
                }

                points.push(point);
            }
        }
    }

    if points.is_empty() {
        return Err(TrackError::Empty);
    }

    debug!("[Track] Parsed {} track points from {} tracks", points.len(), gpx.tracks.len());
    Ok(Track::new(points))
}
