//! GPX track loading: turns track points into samples carrying cumulative
//! distance (km), elevation, latitude and longitude.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use geo::{Distance, Point};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{DistanceModel, PlanError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub distance_km: f64,
    pub elevation_m: f64,
    pub lat: f64,
    pub lon: f64,
}

/// Ordered track samples. The first sample sits at distance 0 and distances
/// never decrease.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    samples: Vec<Sample>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackSummary {
    pub points: usize,
    pub total_distance_km: f64,
    pub min_elevation_m: f64,
    pub max_elevation_m: f64,
    pub center_lat: f64,
    pub center_lon: f64,
}

impl Track {
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self, PlanError> {
        if samples.len() < 2 {
            return Err(PlanError::InsufficientData(samples.len()));
        }
        if samples[0].distance_km != 0.0 {
            return Err(PlanError::InvalidTrack(format!(
                "first sample at {} km, expected 0",
                samples[0].distance_km
            )));
        }
        if let Some(idx) = samples
            .windows(2)
            .position(|w| !(w[1].distance_km >= w[0].distance_km))
        {
            return Err(PlanError::InvalidTrack(format!(
                "distance decreases after sample {}",
                idx
            )));
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn total_distance_km(&self) -> f64 {
        self.samples.last().map(|s| s.distance_km).unwrap_or(0.0)
    }

    pub fn summary(&self) -> TrackSummary {
        let n = self.samples.len() as f64;
        let (min_elevation_m, max_elevation_m) = self.samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), s| (lo.min(s.elevation_m), hi.max(s.elevation_m)),
        );
        TrackSummary {
            points: self.samples.len(),
            total_distance_km: self.total_distance_km(),
            min_elevation_m,
            max_elevation_m,
            center_lat: self.samples.iter().map(|s| s.lat).sum::<f64>() / n,
            center_lon: self.samples.iter().map(|s| s.lon).sum::<f64>() / n,
        }
    }
}

impl DistanceModel {
    /// Distance in meters between two `(lon, lat)` points.
    pub fn distance_m(self, from: Point<f64>, to: Point<f64>) -> f64 {
        match self {
            DistanceModel::Geodesic => geo::Geodesic::distance(from, to),
            DistanceModel::Haversine => geo::Haversine::distance(from, to),
        }
    }
}

/// Read and parse a GPX file from disk.
pub fn load_track(path: &Path, model: DistanceModel) -> Result<Track, PlanError> {
    let bytes = fs::read(path)?;
    let track = parse_track(&bytes, model)?;
    info!(
        "Loaded track {}: {} points, {:.2} km",
        path.display(),
        track.len(),
        track.total_distance_km()
    );
    Ok(track)
}

/// Parse GPX bytes. Points of every track and segment are concatenated in
/// file order.
pub fn parse_track(input: &[u8], model: DistanceModel) -> Result<Track, PlanError> {
    let mut cursor = Cursor::new(input);
    let gpx = gpx::read(&mut cursor).map_err(|e| PlanError::GpxParse(e.to_string()))?;

    let mut coords = Vec::new();
    let mut elevations = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let geo_point = point.point();
                coords.push(Point::new(geo_point.x(), geo_point.y()));
                elevations.push(point.elevation);
            }
        }
    }
    if coords.len() < 2 {
        return Err(PlanError::InsufficientData(coords.len()));
    }

    let (elevations, filled) = fill_elevations(&elevations);
    if filled > 0 {
        warn!(
            "{} of {} track points had no elevation; carried neighbouring values",
            filled,
            coords.len()
        );
    }

    let mut samples = Vec::with_capacity(coords.len());
    let mut total_m = 0.0;
    let mut prev: Option<Point<f64>> = None;
    for (here, elevation_m) in coords.into_iter().zip(elevations) {
        if let Some(last) = prev {
            total_m += model.distance_m(last, here);
        }
        prev = Some(here);
        samples.push(Sample {
            distance_km: total_m / 1000.0,
            elevation_m,
            lat: here.y(),
            lon: here.x(),
        });
    }
    Track::from_samples(samples)
}

/// Carry the last known elevation forward; leading gaps take the first known
/// value and a track without any elevation sits at 0 m.
fn fill_elevations(raw: &[Option<f64>]) -> (Vec<f64>, usize) {
    let mut last = raw.iter().flatten().copied().next().unwrap_or(0.0);
    let mut filled = 0;
    let values = raw
        .iter()
        .map(|ele| match ele {
            Some(v) => {
                last = *v;
                *v
            }
            None => {
                filled += 1;
                last
            }
        })
        .collect();
    (values, filled)
}
