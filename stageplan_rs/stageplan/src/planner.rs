//! Planner session: the current plan, its derived stages, and one reducer that
//! applies edit events in order and autosaves after each mutating one.
//!
//! Stage annotations are keyed by label ("Etappe 3"). Adding or removing a
//! boundary shifts which stretch of track a label refers to; annotations are
//! not remapped.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::boundary::{apply_edit_with, sorted_boundaries, BoundaryEdit};
use crate::pace::{stage_timings, StageTiming};
use crate::segment::{GeoStage, Stage, StageEngine};
use crate::store::{normalize_plan_name, Plan, PlanStore, StageMetadata};
use crate::track::Track;
use crate::{PlanError, PlannerConfig};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlanEvent {
    SelectPlan { name: String },
    CreatePlan { name: String },
    Boundary { edit: BoundaryEdit },
    SetMember { stage: String, member: Option<String> },
    SetPace { stage: String, pace: Option<String> },
    SetNote { stage: String, note: Option<String> },
}

pub struct Planner {
    config: PlannerConfig,
    engine: StageEngine,
    store: PlanStore,
    plan_name: String,
    plan: Plan,
}

impl Planner {
    /// Start on the configured default plan.
    pub fn open(config: PlannerConfig, track: Track) -> Result<Self, PlanError> {
        let name = config.default_plan.clone();
        Self::open_plan(config, track, &name)
    }

    /// Start on the named plan without touching any other plan file. The
    /// configured default boundaries fill in only for the default plan, and
    /// only when it carries none.
    pub fn open_plan(config: PlannerConfig, track: Track, name: &str) -> Result<Self, PlanError> {
        let engine = StageEngine::new(track, config.stage_label_prefix.clone());
        let store = PlanStore::new(config.data_dir.clone());
        let plan_name = normalize_plan_name(name)?;
        let mut plan = store.load_plan(&plan_name)?;
        let is_default = normalize_plan_name(&config.default_plan)
            .map(|default| default == plan_name)
            .unwrap_or(false);
        if plan.boundaries.is_empty() && is_default {
            plan.boundaries = config.default_boundaries.clone();
        }
        plan.boundaries = sorted_boundaries(&plan.boundaries);
        info!("Opened plan {}", plan_name);
        Ok(Self {
            config,
            engine,
            store,
            plan_name,
            plan,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn engine(&self) -> &StageEngine {
        &self.engine
    }

    pub fn store(&self) -> &PlanStore {
        &self.store
    }

    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.plan.boundaries
    }

    pub fn plans(&self) -> Result<Vec<String>, PlanError> {
        self.store.list_plans()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.engine.segment(&self.plan.boundaries)
    }

    pub fn geo_stages(&self) -> Vec<GeoStage> {
        self.engine.segment_geo(&self.plan.boundaries)
    }

    pub fn timings(&self) -> Vec<StageTiming> {
        stage_timings(&self.stages(), &self.plan)
    }

    /// Colour of the member assigned to `label`.
    pub fn stage_color(&self, label: &str) -> &str {
        let member = self
            .plan
            .metadata(label)
            .and_then(|meta| meta.member.as_deref());
        self.config.member_color(member)
    }

    pub fn apply(&mut self, event: PlanEvent) -> Result<(), PlanError> {
        match event {
            PlanEvent::SelectPlan { name } => {
                let plan = self.store.load_plan(&name)?;
                self.plan_name = normalize_plan_name(&name)?;
                self.plan = Plan {
                    boundaries: sorted_boundaries(&plan.boundaries),
                    ..plan
                };
                info!("Selected plan {}", self.plan_name);
                Ok(())
            }
            PlanEvent::CreatePlan { name } => {
                self.plan_name = self.store.create_plan(&name)?;
                self.plan = Plan::default();
                Ok(())
            }
            PlanEvent::Boundary { edit } => {
                let edited = apply_edit_with(
                    &self.plan.boundaries,
                    edit,
                    self.engine.total_distance_km(),
                    self.config.add_fraction,
                );
                let previous = std::mem::replace(&mut self.plan.boundaries, edited);
                self.save().map_err(|err| {
                    self.plan.boundaries = previous;
                    err
                })
            }
            PlanEvent::SetMember { stage, member } => {
                self.annotate(&stage, |meta| meta.member = clean(member))
            }
            PlanEvent::SetPace { stage, pace } => {
                self.annotate(&stage, |meta| meta.pace = clean(pace))
            }
            PlanEvent::SetNote { stage, note } => {
                self.annotate(&stage, |meta| meta.note = clean(note))
            }
        }
    }

    fn annotate<F>(&mut self, label: &str, edit: F) -> Result<(), PlanError>
    where
        F: FnOnce(&mut StageMetadata),
    {
        if !self.stages().iter().any(|s| s.label == label) {
            return Err(PlanError::UnknownStage(label.to_string()));
        }
        let previous = self.plan.stages.clone();
        edit(self.plan.metadata_mut(label));
        self.plan.prune();
        self.save().map_err(|err| {
            self.plan.stages = previous;
            err
        })
    }

    /// Write the whole plan, then keep the boundaries sorted for the next
    /// render.
    fn save(&mut self) -> Result<(), PlanError> {
        let stages = self.stages();
        self.store.save_plan(&self.plan_name, &stages, &self.plan)?;
        self.plan.boundaries = sorted_boundaries(&self.plan.boundaries);
        debug!(
            "Autosaved {}: {} stages, boundaries {:?}",
            self.plan_name,
            stages.len(),
            self.plan.boundaries
        );
        Ok(())
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
