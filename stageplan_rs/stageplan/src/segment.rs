//! Stage segmentation: splits a track at boundary distances and aggregates
//! per-stage distance, elevation gain and elevation loss.
//!
//! Sample selection is inclusive at both edges, so a sample lying exactly on a
//! boundary belongs to both neighbouring stages. No interpolation happens at a
//! boundary; a stage starts and ends at real samples.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::track::{Sample, Track, TrackSummary};
use crate::{round_to, stage_label, DEFAULT_STAGE_PREFIX};

/// Metric view of one stage. Distance is rounded to 2 decimals and elevation
/// figures to 1 decimal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    /// 1-based position in the edge list.
    pub ordinal: usize,
    pub label: String,
    pub start_km: f64,
    pub end_km: f64,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub samples: Vec<Sample>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Map view of one stage. Unlike [`Stage`], emitted even when it holds fewer
/// than two points.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeoStage {
    pub ordinal: usize,
    pub label: String,
    pub points: Vec<LatLon>,
}

/// Stage edges `[0, b.., total]` from boundaries in any order. Values outside
/// `(0, total)` and non-finite values are left out.
pub fn stage_edges(boundaries: &[f64], total_km: f64) -> Vec<f64> {
    let mut inner: Vec<f64> = boundaries
        .iter()
        .copied()
        .filter(|b| b.is_finite() && *b > 0.0 && *b < total_km)
        .collect();
    inner.sort_by(f64::total_cmp);

    let mut edges = Vec::with_capacity(inner.len() + 2);
    edges.push(0.0);
    edges.extend(inner);
    edges.push(total_km);
    edges
}

/// Samples with `start <= distance <= end`. Distances are non-decreasing, so
/// the selection is one contiguous run.
fn select(samples: &[Sample], start: f64, end: f64) -> &[Sample] {
    let lo = samples.partition_point(|s| s.distance_km < start);
    let hi = samples.partition_point(|s| s.distance_km <= end);
    if lo >= hi {
        &[]
    } else {
        &samples[lo..hi]
    }
}

fn elevation_deltas(samples: &[Sample]) -> (f64, f64) {
    samples.windows(2).fold((0.0, 0.0), |(gain, loss), w| {
        let delta = w[1].elevation_m - w[0].elevation_m;
        if delta > 0.0 {
            (gain + delta, loss)
        } else {
            (gain, loss - delta)
        }
    })
}

fn segment_with_prefix(track: &Track, boundaries: &[f64], prefix: &str) -> Vec<Stage> {
    let edges = stage_edges(boundaries, track.total_distance_km());
    let mut stages = Vec::with_capacity(edges.len() - 1);
    for (i, pair) in edges.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        let selected = select(track.samples(), start, end);
        if selected.len() < 2 {
            debug!(
                "Dropping stage {} [{:.2}, {:.2}] km: {} sample(s)",
                i + 1,
                start,
                end,
                selected.len()
            );
            continue;
        }
        let first = selected[0];
        let last = selected[selected.len() - 1];
        let (gain, loss) = elevation_deltas(selected);
        stages.push(Stage {
            ordinal: i + 1,
            label: stage_label(prefix, i + 1),
            start_km: start,
            end_km: end,
            distance_km: round_to(last.distance_km - first.distance_km, 2),
            elevation_gain_m: round_to(gain, 1),
            elevation_loss_m: round_to(loss, 1),
            samples: selected.to_vec(),
        });
    }
    stages
}

fn segment_geo_with_prefix(track: &Track, boundaries: &[f64], prefix: &str) -> Vec<GeoStage> {
    let edges = stage_edges(boundaries, track.total_distance_km());
    edges
        .windows(2)
        .enumerate()
        .map(|(i, pair)| GeoStage {
            ordinal: i + 1,
            label: stage_label(prefix, i + 1),
            points: select(track.samples(), pair[0], pair[1])
                .iter()
                .map(|s| LatLon {
                    lat: s.lat,
                    lon: s.lon,
                })
                .collect(),
        })
        .collect()
}

/// Split `track` at `boundaries`. Stages with fewer than two samples are
/// dropped without shifting the ordinals of the remaining ones.
pub fn segment(track: &Track, boundaries: &[f64]) -> Vec<Stage> {
    segment_with_prefix(track, boundaries, DEFAULT_STAGE_PREFIX)
}

/// Per-stage coordinates for map rendering, one entry per edge pair.
pub fn segment_geo(track: &Track, boundaries: &[f64]) -> Vec<GeoStage> {
    segment_geo_with_prefix(track, boundaries, DEFAULT_STAGE_PREFIX)
}

/// Segmentation bound to one track and label prefix.
#[derive(Clone, Debug)]
pub struct StageEngine {
    track: Track,
    label_prefix: String,
}

impl StageEngine {
    pub fn new(track: Track, label_prefix: impl Into<String>) -> Self {
        Self {
            track,
            label_prefix: label_prefix.into(),
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn total_distance_km(&self) -> f64 {
        self.track.total_distance_km()
    }

    pub fn summary(&self) -> TrackSummary {
        self.track.summary()
    }

    pub fn label(&self, ordinal: usize) -> String {
        stage_label(&self.label_prefix, ordinal)
    }

    pub fn segment(&self, boundaries: &[f64]) -> Vec<Stage> {
        segment_with_prefix(&self.track, boundaries, &self.label_prefix)
    }

    pub fn segment_geo(&self, boundaries: &[f64]) -> Vec<GeoStage> {
        segment_geo_with_prefix(&self.track, boundaries, &self.label_prefix)
    }
}
