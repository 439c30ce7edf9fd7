use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use wbasym_event::{Histo1D, Lepton, P4, WbChargeAsymmetryEvent, read_event_tree, write_event_tree};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wbasym"))
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn s(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

fn make_input(dir: &Path) -> PathBuf {
    let events: Vec<WbChargeAsymmetryEvent> = [13, -13, 11, -11]
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let mut ev = WbChargeAsymmetryEvent::new();
            ev.run = 3;
            ev.event = i as u32;
            ev.reco_sel = true;
            ev.push_weight(4.0).unwrap();
            ev.lepton = Lepton { id, p4: P4 { pt: 40.0, ..P4::default() } };
            ev
        })
        .collect();
    let path = dir.join("in.parquet");
    write_event_tree(&path, "data", &events, &BTreeMap::new()).unwrap();
    path
}

#[test]
fn run_prints_summary_and_writes_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path());
    let output = dir.path().join("out.parquet");
    let norm = dir.path().join("norm.json");
    let mut h = Histo1D::uniform("norm", "", 1, 0.0, 1.0).unwrap();
    h.bin_content[0] = 0.25;
    h.write_json(&norm).unwrap();

    let out = run(&[
        "run",
        "--input",
        &s(&input),
        "--output",
        &s(&output),
        "--channel",
        "13",
        "--charge",
        "-1",
        "--norm",
        &s(&norm),
        "--era",
        "era2016",
    ]);
    assert!(out.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["events_read"], 4);
    assert_eq!(summary["events_written"], 1);
    assert_eq!(summary["charge_selection"], -1);
    assert_eq!(summary["era"], "era2016");

    let rows = read_event_tree(&output).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].lepton.id, 13);
    assert_eq!(&*rows[0].weights, &[1.0]);
}

#[test]
fn run_with_settings_and_summary_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path());
    let output = dir.path().join("out.parquet");
    let settings = dir.path().join("settings.yaml");
    std::fs::write(&settings, "tree_name: wb\nmax_events: 2\n").unwrap();
    let summary_path = dir.path().join("summary.json");

    let out = run(&[
        "--log-level",
        "info",
        "run",
        "-i",
        &s(&input),
        "-o",
        &s(&output),
        "--era",
        "era2018",
        "--config",
        &s(&settings),
        "--summary",
        &s(&summary_path),
        "--debug",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["events_read"], 2);
    assert_eq!(summary["tree_name"], "wb");
    assert!(String::from_utf8_lossy(&out.stderr).contains("event"));

    let out = run(&["inspect", "--input", &s(&output)]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let info: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(info["tree_name"], "wb");
    assert_eq!(info["entries"], 2);
    assert_eq!(info["schema_version"], "wb_charge_asymmetry_event_v1");
    assert_eq!(info["columns"].as_array().unwrap().len(), 45);
    assert_eq!(info["metadata"]["wbasym.era"], "era2018");
    assert_eq!(info["histograms"][0]["name"], "cutflow");
}

#[test]
fn invalid_era_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path());
    let out = run(&[
        "run",
        "--input",
        &s(&input),
        "--output",
        &s(&dir.path().join("out.parquet")),
        "--era",
        "2016",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid era"));
}

#[test]
fn invalid_channel_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = make_input(dir.path());
    let out = run(&[
        "run",
        "--input",
        &s(&input),
        "--output",
        &s(&dir.path().join("out.parquet")),
        "--channel",
        "15",
        "--era",
        "era2016",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("channel code 15"));
}

#[test]
fn version_prints_name() {
    let out = run(&["version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("wbasym "));
}
