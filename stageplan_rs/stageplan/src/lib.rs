//! Stage planning over a fixed GPX route: segmentation into stages, boundary
//! edits and per-plan CSV storage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod boundary;
pub mod pace;
pub mod planner;
pub mod segment;
pub mod store;
pub mod track;

pub use boundary::{apply_edit, apply_edit_with, sorted_boundaries, BoundaryEdit, ADD_FRACTION};
pub use pace::{format_minutes, parse_pace, stage_timings, StageTiming};
pub use planner::{PlanEvent, Planner};
pub use segment::{segment, segment_geo, stage_edges, GeoStage, LatLon, Stage, StageEngine};
pub use store::{normalize_plan_name, Plan, PlanStore, StageMetadata};
pub use track::{load_track, parse_track, Sample, Track, TrackSummary};

/// Label prefix used for stage names and the first column of plan files.
pub const DEFAULT_STAGE_PREFIX: &str = "Etappe";

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to parse GPX file: {0}")]
    GpxParse(String),
    #[error("insufficient track data: {0} point(s), need at least 2")]
    InsufficientData(usize),
    #[error("invalid track: {0}")]
    InvalidTrack(String),
    #[error("malformed plan file {file}: {reason}")]
    MalformedPlan { file: String, reason: String },
    #[error("invalid plan name: {0:?}")]
    InvalidPlanName(String),
    #[error("unknown stage: {0}")]
    UnknownStage(String),
}

/// How the distance between consecutive track points is measured.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceModel {
    /// Ellipsoidal (WGS84) distance.
    Geodesic,
    /// Great-circle distance on a sphere.
    Haversine,
}

impl Default for DistanceModel {
    fn default() -> Self {
        DistanceModel::Geodesic
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMember {
    pub name: String,
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub data_dir: PathBuf,
    pub default_plan: String,
    /// Boundaries used when the startup plan carries none.
    pub default_boundaries: Vec<f64>,
    pub stage_label_prefix: String,
    pub add_fraction: f64,
    pub distance_model: DistanceModel,
    pub team: Vec<TeamMember>,
    pub unassigned_color: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            default_plan: "etappes_data.csv".to_string(),
            default_boundaries: Vec::new(),
            stage_label_prefix: DEFAULT_STAGE_PREFIX.to_string(),
            add_fraction: ADD_FRACTION,
            distance_model: DistanceModel::Geodesic,
            team: Vec::new(),
            unassigned_color: "black".to_string(),
        }
    }
}

impl PlannerConfig {
    pub fn stage_label(&self, ordinal: usize) -> String {
        stage_label(&self.stage_label_prefix, ordinal)
    }

    /// Colour of a team member, or the unassigned colour for unknown/absent names.
    pub fn member_color(&self, name: Option<&str>) -> &str {
        name.and_then(|name| self.team.iter().find(|m| m.name == name))
            .map(|m| m.color.as_str())
            .unwrap_or(self.unassigned_color.as_str())
    }

    /// Team member names, sorted.
    pub fn members(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.team.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

pub(crate) fn stage_label(prefix: &str, ordinal: usize) -> String {
    format!("{} {}", prefix, ordinal)
}

/// Round through the shortest decimal formatting, so `0.35` (stored just
/// below 0.35) rounds down and exact ties go to the even digit.
pub(crate) fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.3456, 2), 12.35);
        assert_eq!(round_to(80.04, 1), 80.0);
        assert_eq!(round_to(99.999, 2), 100.0);
    }

    #[test]
    fn test_round_to_follows_stored_decimal_value() {
        assert_eq!(round_to(0.35, 1), 0.3);
        assert_eq!(round_to(0.25, 1), 0.2);
        assert_eq!(round_to(0.75, 1), 0.8);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(-0.25, 1), -0.2);
    }

    #[test]
    fn test_member_color_falls_back_to_unassigned() {
        let config = PlannerConfig {
            team: vec![
                TeamMember {
                    name: "Robin".into(),
                    color: "#3F51B5".into(),
                },
                TeamMember {
                    name: "Daan".into(),
                    color: "#2196F3".into(),
                },
            ],
            ..PlannerConfig::default()
        };
        assert_eq!(config.member_color(Some("Robin")), "#3F51B5");
        assert_eq!(config.member_color(Some("Nobody")), "black");
        assert_eq!(config.member_color(None), "black");
        assert_eq!(config.members(), vec!["Daan", "Robin"]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"data_dir": "plans", "distance_model": "haversine"}"#)
                .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("plans"));
        assert_eq!(config.distance_model, DistanceModel::Haversine);
        assert_eq!(config.stage_label_prefix, "Etappe");
        assert_eq!(config.add_fraction, 0.9);
        assert_eq!(config.stage_label(3), "Etappe 3");
    }
}
