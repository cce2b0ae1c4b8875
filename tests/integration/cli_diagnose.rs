#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

fn seed(path: &Path) {
    let conn = Connection::open(path).expect("create db");
    conn.execute_batch(
        "CREATE TABLE wards (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO wards (name) VALUES ('north'), ('south');",
    )
    .expect("seed");
}

fn isolated(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("salvage");
    cmd.current_dir(dir.path())
        .env_remove("SALVAGE_CONFIG")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"))
        .env("HOME", dir.path());
    cmd
}

#[test]
fn no_arguments_diagnoses_hospital_db_in_working_directory() {
    let dir = TempDir::new().expect("tempdir");
    seed(&dir.path().join("hospital.db"));

    let output = isolated(&dir).output().expect("run salvage");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Opened DB successfully."));
    assert!(stdout.contains("VACUUM completed."));

    assert!(dir.path().join("db_diagnostic.txt").exists());
    assert!(dir.path().join("hospital_table_wards.csv").exists());
    assert!(dir.path().join("hospital_dump.sql").exists());
}

#[test]
fn missing_database_still_exits_zero() {
    let dir = TempDir::new().expect("tempdir");

    let output = isolated(&dir).output().expect("run salvage");
    assert!(output.status.success());
    let report = fs::read_to_string(dir.path().join("db_diagnostic.txt")).expect("report");
    assert!(report.contains("ERROR: Database file 'hospital.db' not found"));
}

#[test]
fn json_format_prints_only_the_summary() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("clinic.db");
    seed(&db);

    let output = isolated(&dir)
        .args(["--db", "clinic.db", "--format", "json", "--no-vacuum"])
        .output()
        .expect("run salvage");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout is json");
    assert_eq!(json["outcome"], "healthy");
    assert_eq!(json["tables"][0]["table"], "wards");
    assert_eq!(json["tables"][0]["rows"], 2);
    assert_eq!(json["exports"][0]["rows_exported"], 2);

    let vacuum = json["steps"]
        .as_array()
        .expect("steps")
        .iter()
        .find(|step| step["step"] == "vacuum")
        .expect("vacuum step");
    assert_eq!(vacuum["status"], "skipped");
}

#[test]
fn config_file_supplies_defaults() {
    let dir = TempDir::new().expect("tempdir");
    seed(&dir.path().join("records.db"));
    let config = dir.path().join("salvage.toml");
    fs::write(
        &config,
        "[database]\ndefault = \"records.db\"\n\n[diagnose]\nrow_limit = 1\nexport_prefix = \"snap\"\n",
    )
    .expect("write config");

    let output = isolated(&dir)
        .arg("--quiet")
        .env("SALVAGE_CONFIG", &config)
        .output()
        .expect("run salvage");
    assert!(output.status.success());

    let csv = fs::read_to_string(dir.path().join("snap_table_wards.csv")).expect("csv");
    assert_eq!(csv.lines().count(), 2);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Opened DB successfully."));
    assert!(stdout.contains("Artifacts"));
    assert!(stdout.contains("snap_table_wards.csv"));
    assert!(stdout.contains("done vacuum"));
    assert!(stdout.contains("Integrity confirmed and dump written."));
}

#[test]
fn invalid_config_crashes_with_exit_one() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[diagnose]\nlevel = \"thorough\"\n").expect("write config");

    let output = isolated(&dir)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("run salvage");
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Diagnostic tool crashed: "));
}
