//! Pace parsing and stage time estimates.

use serde::{Deserialize, Serialize};

use crate::segment::Stage;
use crate::store::Plan;

/// Parse a `M:SS` pace into minutes per km. Anything that is not two
/// non-negative integers around a colon yields `None`.
pub fn parse_pace(text: &str) -> Option<f64> {
    let mut parts = text.trim().split(':');
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let seconds: u32 = parts.next()?.trim().parse().ok()?;
    Some(minutes as f64 + seconds as f64 / 60.0)
}

/// Format minutes as `H:MM`, truncating partial minutes.
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0);
    format!("{}:{:02}", (total / 60.0) as u64, (total % 60.0) as u64)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StageTiming {
    pub label: String,
    pub pace_min_per_km: Option<f64>,
    /// `pace * distance`, present only when positive.
    pub minutes: Option<f64>,
    /// Running total over the stages so far; present only alongside `minutes`.
    pub cumulative_minutes: Option<f64>,
}

impl StageTiming {
    pub fn time_text(&self) -> String {
        self.minutes.map(format_minutes).unwrap_or_default()
    }

    pub fn cumulative_text(&self) -> String {
        self.cumulative_minutes.map(format_minutes).unwrap_or_default()
    }
}

pub fn stage_timings(stages: &[Stage], plan: &Plan) -> Vec<StageTiming> {
    let mut running = 0.0;
    stages
        .iter()
        .map(|stage| {
            let pace = plan
                .metadata(&stage.label)
                .and_then(|meta| meta.pace.as_deref())
                .and_then(parse_pace);
            let minutes = pace
                .map(|p| p * stage.distance_km)
                .filter(|m| *m > 0.0);
            if let Some(m) = minutes {
                running += m;
            }
            StageTiming {
                label: stage.label.clone(),
                pace_min_per_km: pace,
                minutes,
                cumulative_minutes: minutes.map(|_| running),
            }
        })
        .collect()
}
