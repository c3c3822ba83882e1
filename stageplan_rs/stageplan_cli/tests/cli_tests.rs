// End-to-end tests for the stageplan binary against a small GPX fixture.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Eleven points along the equator, 0.1 degree apart (about 111 km total).
fn write_track(dir: &TempDir) -> PathBuf {
    let mut points = String::new();
    for i in 0..=10 {
        let ele = if i % 2 == 0 { 100 } else { 160 };
        points.push_str(&format!(
            "<trkpt lat=\"0.0\" lon=\"{:.1}\"><ele>{}</ele></trkpt>",
            i as f64 * 0.1,
            ele
        ));
    }
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <gpx version=\"1.1\" creator=\"tests\" xmlns=\"http://www.topografix.com/GPX/1/1\">\
         <trk><name>parcours</name><trkseg>{}</trkseg></trk></gpx>",
        points
    );
    let path = dir.path().join("parcours.gpx");
    fs::write(&path, doc).unwrap();
    path
}

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let track = write_track(&dir);
    let data = dir.path().join("data");
    (dir, track, data)
}

fn stageplan(track: &PathBuf, data: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("stageplan").unwrap();
    cmd.arg("--track").arg(track).arg("--data-dir").arg(data);
    cmd
}

#[test]
fn test_plans_on_fresh_directory() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data)
        .arg("plans")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert!(data.is_dir());
}

#[test]
fn test_new_plan_is_listed() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data)
        .args(["new", "zomer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created plan zomer.csv"));
    stageplan(&track, &data)
        .arg("plans")
        .assert()
        .success()
        .stdout("zomer.csv\n");
}

#[test]
fn test_boundary_edits_split_the_route() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data)
        .args(["show", "reis"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Etappe 1").and(predicate::str::contains("Etappe 2").not()));

    stageplan(&track, &data).args(["add", "reis"]).assert().success();
    stageplan(&track, &data)
        .args(["move", "reis", "0", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Etappe 2"));

    let saved = fs::read_to_string(data.join("reis.csv")).unwrap();
    assert!(saved.starts_with("Etappe,Afstand,Stijging,Daling,Teamlid,Tempo,Opmerking"));
    assert!(saved.contains("_GRENZEN,50.0"));

    stageplan(&track, &data).args(["remove", "reis"]).assert().success();
    let saved = fs::read_to_string(data.join("reis.csv")).unwrap();
    assert!(saved.trim_end().ends_with("_GRENZEN"));
}

#[test]
fn test_remove_on_empty_plan_is_noop() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data)
        .args(["remove", "leeg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Etappe 1"));
}

#[test]
fn test_pace_and_note_show_up_in_table() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data).args(["add", "reis"]).assert().success();
    stageplan(&track, &data)
        .args(["move", "reis", "0", "50"])
        .assert()
        .success();
    stageplan(&track, &data)
        .args(["pace", "reis", "2", "5:00"])
        .assert()
        .success();
    stageplan(&track, &data)
        .args(["note", "reis", "Etappe 1", "start bij de bakker"])
        .assert()
        .success();

    stageplan(&track, &data)
        .args(["show", "reis"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("5:00")
                .and(predicate::str::contains("start bij de bakker")),
        );

    let saved = fs::read_to_string(data.join("reis.csv")).unwrap();
    assert!(saved.contains(",5:00,"));
}

#[test]
fn test_broken_default_plan_does_not_block_other_plans() {
    let (_dir, track, data) = setup();
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("etappes_data.csv"), "Etappe\n_GRENZEN,abc\n").unwrap();

    stageplan(&track, &data)
        .args(["show", "reis"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Etappe 1"));
    stageplan(&track, &data).args(["add", "reis"]).assert().success();

    stageplan(&track, &data)
        .args(["show", "etappes_data"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed plan file"));
}

#[test]
fn test_unknown_stage_fails() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data)
        .args(["note", "reis", "7", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
}

#[test]
fn test_assign_checks_configured_team() {
    let (dir, track, data) = setup();
    let config = dir.path().join("planner.json");
    fs::write(
        &config,
        r##"{"team": [{"name": "Ewald", "color": "#4CAF50"}]}"##,
    )
    .unwrap();

    stageplan(&track, &data)
        .arg("--config")
        .arg(&config)
        .args(["assign", "reis", "1", "Nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown team member"));

    stageplan(&track, &data)
        .arg("--config")
        .arg(&config)
        .args(["assign", "reis", "1", "Ewald"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#4CAF50"));
}

#[test]
fn test_geo_export() {
    let (_dir, track, data) = setup();
    stageplan(&track, &data)
        .args(["geo", "reis"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"stages\"")
                .and(predicate::str::contains("\"color\": \"black\""))
                .and(predicate::str::contains("\"label\": \"Etappe 1\"")),
        );
}

#[test]
fn test_missing_track_fails() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    stageplan(&dir.path().join("missing.gpx"), &data)
        .args(["show", "reis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load track"));
}
