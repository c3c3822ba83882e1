//! Flat-file plan storage. One CSV per plan: a header, one row per stage,
//! a blank row and a `_GRENZEN` row carrying the boundary list.
//!
//! Every save rewrites the whole file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::boundary::sorted_boundaries;
use crate::segment::Stage;
use crate::PlanError;

pub const PLAN_EXTENSION: &str = ".csv";
pub const BOUNDARY_SENTINEL: &str = "_GRENZEN";
pub const PLAN_HEADER: [&str; 7] = [
    "Etappe",
    "Afstand",
    "Stijging",
    "Daling",
    "Teamlid",
    "Tempo",
    "Opmerking",
];

const MEMBER_COL: usize = 4;
const PACE_COL: usize = 5;
const NOTE_COL: usize = 6;

/// Annotations for one stage. Empty strings are never stored.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageMetadata {
    pub member: Option<String>,
    pub pace: Option<String>,
    pub note: Option<String>,
}

impl StageMetadata {
    pub fn is_empty(&self) -> bool {
        self.member.is_none() && self.pace.is_none() && self.note.is_none()
    }
}

/// Boundaries plus per-stage annotations keyed by stage label.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub boundaries: Vec<f64>,
    pub stages: BTreeMap<String, StageMetadata>,
}

impl Plan {
    pub fn metadata(&self, label: &str) -> Option<&StageMetadata> {
        self.stages.get(label)
    }

    pub fn metadata_mut(&mut self, label: &str) -> &mut StageMetadata {
        self.stages.entry(label.to_string()).or_default()
    }

    /// Drop labels whose annotations are all empty.
    pub fn prune(&mut self) {
        self.stages.retain(|_, meta| !meta.is_empty());
    }

    pub fn members(&self) -> BTreeMap<String, String> {
        self.column(|meta| meta.member.as_deref())
    }

    pub fn paces(&self) -> BTreeMap<String, String> {
        self.column(|meta| meta.pace.as_deref())
    }

    pub fn notes(&self) -> BTreeMap<String, String> {
        self.column(|meta| meta.note.as_deref())
    }

    fn column<F>(&self, pick: F) -> BTreeMap<String, String>
    where
        F: Fn(&StageMetadata) -> Option<&str>,
    {
        self.stages
            .iter()
            .filter_map(|(label, meta)| pick(meta).map(|v| (label.clone(), v.to_string())))
            .collect()
    }
}

/// Trim the name and append `.csv` when missing. Empty names and names that
/// would leave the plan directory are rejected.
pub fn normalize_plan_name(raw: &str) -> Result<String, PlanError> {
    let name = raw.trim();
    if name.is_empty()
        || name == PLAN_EXTENSION
        || name.contains(['/', '\\'])
        || name.starts_with('.')
    {
        return Err(PlanError::InvalidPlanName(raw.to_string()));
    }
    if name.ends_with(PLAN_EXTENSION) {
        Ok(name.to_string())
    } else {
        Ok(format!("{}{}", name, PLAN_EXTENSION))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn format_number(value: f64) -> String {
    format!("{:?}", value)
}

/// Plans stored as CSV files in one directory.
#[derive(Clone, Debug)]
pub struct PlanStore {
    dir: PathBuf,
}

impl PlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn plan_path(&self, name: &str) -> Result<PathBuf, PlanError> {
        Ok(self.dir.join(normalize_plan_name(name)?))
    }

    /// Sorted plan file names. Creates the directory when it is missing.
    pub fn list_plans(&self) -> Result<Vec<String>, PlanError> {
        fs::create_dir_all(&self.dir)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            match file_name.to_str() {
                Some(name) if name.ends_with(PLAN_EXTENSION) => names.push(name.to_string()),
                Some(_) => {}
                None => debug!("Skipping non UTF-8 file name {:?}", file_name),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load a plan; a plan without a file is empty.
    pub fn load_plan(&self, name: &str) -> Result<Plan, PlanError> {
        let path = self.plan_path(name)?;
        if !path.exists() {
            debug!("No plan file at {}; starting empty", path.display());
            return Ok(Plan::default());
        }
        let bytes = fs::read(&path)?;
        let plan = decode_plan(&bytes).map_err(|err| match err {
            PlanError::MalformedPlan { reason, .. } => PlanError::MalformedPlan {
                file: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        info!(
            "Loaded plan {}: {} boundaries, {} annotated stages",
            path.display(),
            plan.boundaries.len(),
            plan.stages.len()
        );
        Ok(plan)
    }

    /// Overwrite the plan file with one row per computed stage and the
    /// boundary list, sorted.
    pub fn save_plan(&self, name: &str, stages: &[Stage], plan: &Plan) -> Result<(), PlanError> {
        let path = self.plan_path(name)?;
        fs::create_dir_all(&self.dir)?;
        let bytes = encode_plan(stages, plan)?;
        fs::write(&path, bytes)?;
        debug!("Saved plan {} ({} stages)", path.display(), stages.len());
        Ok(())
    }

    /// Write an empty plan under the normalized name and return that name.
    /// An existing plan of the same name is replaced.
    pub fn create_plan(&self, name: &str) -> Result<String, PlanError> {
        let name = normalize_plan_name(name)?;
        self.save_plan(&name, &[], &Plan::default())?;
        info!("Created plan {}", name);
        Ok(name)
    }
}

pub(crate) fn encode_plan(stages: &[Stage], plan: &Plan) -> Result<Vec<u8>, PlanError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(PLAN_HEADER)?;
    for stage in stages {
        let meta = plan.metadata(&stage.label).cloned().unwrap_or_default();
        writer.write_record([
            stage.label.clone(),
            format_number(stage.distance_km),
            format_number(stage.elevation_gain_m),
            format_number(stage.elevation_loss_m),
            meta.member.unwrap_or_default(),
            meta.pace.unwrap_or_default(),
            meta.note.unwrap_or_default(),
        ])?;
    }
    let mut bytes = writer.into_inner().map_err(|e| PlanError::Io(e.into_error()))?;
    bytes.push(b'\n');

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(bytes);
    let mut sentinel = vec![BOUNDARY_SENTINEL.to_string()];
    sentinel.extend(sorted_boundaries(&plan.boundaries).into_iter().map(format_number));
    writer.write_record(&sentinel)?;
    writer.into_inner().map_err(|e| PlanError::Io(e.into_error()))
}

pub(crate) fn decode_plan(bytes: &[u8]) -> Result<Plan, PlanError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let mut plan = Plan::default();
    for record in reader.records() {
        let record = record?;
        let label = match record.get(0) {
            Some(label) if !label.is_empty() => label,
            _ => continue,
        };
        if label == BOUNDARY_SENTINEL {
            plan.boundaries = record
                .iter()
                .skip(1)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| {
                    v.parse::<f64>().map_err(|_| PlanError::MalformedPlan {
                        file: String::new(),
                        reason: format!("boundary {:?} is not a number", v),
                    })
                })
                .collect::<Result<_, _>>()?;
            continue;
        }
        let meta = StageMetadata {
            member: non_empty(record.get(MEMBER_COL)),
            pace: non_empty(record.get(PACE_COL)),
            note: non_empty(record.get(NOTE_COL)),
        };
        if !meta.is_empty() {
            plan.stages.insert(label.to_string(), meta);
        }
    }
    Ok(plan)
}
