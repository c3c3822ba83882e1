use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use serde::Serialize;
use stageplan::{
    load_track, BoundaryEdit, LatLon, PlanEvent, PlanStore, Planner, PlannerConfig, TrackSummary,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Split a GPX route into stages and plan who rides them", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// GPX track to plan over
    #[arg(long, global = true, default_value = "parcours.gpx", value_hint = ValueHint::FilePath)]
    track: PathBuf,

    /// Directory holding the plan CSV files
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Planner config JSON
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored plans
    Plans,
    /// Create an empty plan
    New {
        name: String,
    },
    /// Write the stage table with timings as CSV
    Show {
        plan: String,

        /// Output CSV path (`-` for stdout)
        #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Move the boundary at INDEX (0-based, ascending order) to KM
    Move {
        plan: String,
        index: usize,
        km: f64,
    },
    /// Add a boundary between the last boundary and the end of the track
    Add {
        plan: String,
    },
    /// Remove the last boundary
    Remove {
        plan: String,
    },
    /// Assign a team member to a stage (omit MEMBER to clear)
    Assign {
        plan: String,
        /// Stage number or label
        stage: String,
        member: Option<String>,
    },
    /// Set a stage pace as M:SS per km (omit PACE to clear)
    Pace {
        plan: String,
        stage: String,
        pace: Option<String>,
    },
    /// Set a stage note (omit TEXT to clear)
    Note {
        plan: String,
        stage: String,
        text: Option<String>,
    },
    /// Write per-stage coordinates and colours as JSON for a map
    Geo {
        plan: String,

        /// Output JSON path (`-` for stdout)
        #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct GeoExport<'a> {
    plan: &'a str,
    track: TrackSummary,
    stages: Vec<GeoStageExport<'a>>,
}

#[derive(Serialize)]
struct GeoStageExport<'a> {
    ordinal: usize,
    label: String,
    member: Option<&'a str>,
    color: &'a str,
    points: Vec<LatLon>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.global.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = resolve_config(&cli.global)?;
    match cli.command {
        Command::Plans => handle_plans(&config),
        Command::New { name } => handle_new(&config, &name),
        Command::Show { plan, output } => {
            let planner = open_plan(&cli.global, config, &plan)?;
            write_stage_table(&planner, &output)
        }
        Command::Move { plan, index, km } => edit(&cli.global, config, &plan, |_| {
            Ok(PlanEvent::Boundary {
                edit: BoundaryEdit::Move {
                    index,
                    distance_km: km,
                },
            })
        }),
        Command::Add { plan } => edit(&cli.global, config, &plan, |_| {
            Ok(PlanEvent::Boundary {
                edit: BoundaryEdit::Add,
            })
        }),
        Command::Remove { plan } => edit(&cli.global, config, &plan, |_| {
            Ok(PlanEvent::Boundary {
                edit: BoundaryEdit::Remove,
            })
        }),
        Command::Assign {
            plan,
            stage,
            member,
        } => edit(&cli.global, config, &plan, |planner| {
            if let Some(name) = member.as_deref() {
                let known = planner.config().members();
                if !known.is_empty() && !known.contains(&name) {
                    return Err(anyhow!(
                        "unknown team member '{}' (known: {})",
                        name,
                        known.join(", ")
                    ));
                }
            }
            Ok(PlanEvent::SetMember {
                stage: resolve_stage(planner, &stage),
                member,
            })
        }),
        Command::Pace { plan, stage, pace } => edit(&cli.global, config, &plan, |planner| {
            Ok(PlanEvent::SetPace {
                stage: resolve_stage(planner, &stage),
                pace,
            })
        }),
        Command::Note { plan, stage, text } => edit(&cli.global, config, &plan, |planner| {
            Ok(PlanEvent::SetNote {
                stage: resolve_stage(planner, &stage),
                note: text,
            })
        }),
        Command::Geo { plan, output } => {
            let planner = open_plan(&cli.global, config, &plan)?;
            write_geo(&planner, &output)
        }
    }
}

fn resolve_config(global: &GlobalArgs) -> Result<PlannerConfig> {
    let mut config = match &global.config {
        Some(path) => load_config(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(dir) = &global.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<PlannerConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: PlannerConfig = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid planner config", path.display()))?;
    if !(config.add_fraction > 0.0 && config.add_fraction < 1.0) {
        return Err(anyhow!(
            "add_fraction must lie strictly between 0 and 1, got {}",
            config.add_fraction
        ));
    }
    Ok(config)
}

fn handle_plans(config: &PlannerConfig) -> Result<()> {
    let store = PlanStore::new(config.data_dir.clone());
    let plans = store
        .list_plans()
        .with_context(|| format!("failed to list plans in {}", store.dir().display()))?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for name in plans {
        writeln!(handle, "{}", name)?;
    }
    Ok(())
}

fn handle_new(config: &PlannerConfig, name: &str) -> Result<()> {
    let store = PlanStore::new(config.data_dir.clone());
    let name = store
        .create_plan(name)
        .with_context(|| format!("failed to create plan '{}'", name))?;
    println!("Created plan {}", name);
    Ok(())
}

fn open_plan(global: &GlobalArgs, config: PlannerConfig, plan: &str) -> Result<Planner> {
    let track = load_track(&global.track, config.distance_model)
        .with_context(|| format!("failed to load track {}", global.track.display()))?;
    Planner::open_plan(config, track, plan)
        .with_context(|| format!("failed to load plan '{}'", plan))
}

/// Open `plan`, apply one event and print the resulting stage table.
fn edit<F>(global: &GlobalArgs, config: PlannerConfig, plan: &str, make_event: F) -> Result<()>
where
    F: FnOnce(&Planner) -> Result<PlanEvent>,
{
    let mut planner = open_plan(global, config, plan)?;
    let event = make_event(&planner)?;
    planner
        .apply(event)
        .with_context(|| format!("failed to update plan '{}'", planner.plan_name()))?;
    info!(
        "Saved {}: boundaries {:?}",
        planner.plan_name(),
        planner.boundaries()
    );
    write_stage_table(&planner, Path::new("-"))
}

/// A bare number is a stage ordinal; anything else is taken as a label.
fn resolve_stage(planner: &Planner, stage: &str) -> String {
    match stage.trim().parse::<usize>() {
        Ok(ordinal) => planner.engine().label(ordinal),
        Err(_) => stage.trim().to_string(),
    }
}

fn write_stage_table(planner: &Planner, path: &Path) -> Result<()> {
    if path == Path::new("-") {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_stage_rows(planner, &mut writer)
    } else {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_stage_rows(planner, &mut writer)?;
        info!("Wrote stage table: {}", path.display());
        Ok(())
    }
}

fn write_stage_rows<W: Write>(planner: &Planner, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "stage",
        "start_km",
        "end_km",
        "distance_km",
        "gain_m",
        "loss_m",
        "member",
        "color",
        "pace",
        "time",
        "cumulative",
        "note",
    ])?;

    let stages = planner.stages();
    let timings = planner.timings();
    for (stage, timing) in stages.iter().zip(timings.iter()) {
        let meta = planner.plan().metadata(&stage.label);
        let text = |value: Option<&String>| value.cloned().unwrap_or_default();
        writer.write_record([
            stage.label.clone(),
            format!("{:.2}", stage.start_km),
            format!("{:.2}", stage.end_km),
            format!("{:.2}", stage.distance_km),
            format!("{:.1}", stage.elevation_gain_m),
            format!("{:.1}", stage.elevation_loss_m),
            text(meta.and_then(|m| m.member.as_ref())),
            planner.stage_color(&stage.label).to_string(),
            text(meta.and_then(|m| m.pace.as_ref())),
            timing.time_text(),
            timing.cumulative_text(),
            text(meta.and_then(|m| m.note.as_ref())),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn write_geo(planner: &Planner, path: &Path) -> Result<()> {
    let stages = planner
        .geo_stages()
        .into_iter()
        .map(|geo| {
            let member = planner
                .plan()
                .metadata(&geo.label)
                .and_then(|m| m.member.as_deref());
            GeoStageExport {
                ordinal: geo.ordinal,
                color: planner.stage_color(&geo.label),
                label: geo.label,
                member,
                points: geo.points,
            }
        })
        .collect();
    let export = GeoExport {
        plan: planner.plan_name(),
        track: planner.engine().summary(),
        stages,
    };
    let text = serde_json::to_string_pretty(&export)?;
    if path == Path::new("-") {
        println!("{}", text);
    } else {
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote stage geometry: {}", path.display());
    }
    Ok(())
}
