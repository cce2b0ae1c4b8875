#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use rusqlite::Connection;
use salvage::diagnose::{self, DiagnoseConfig, ExportOutcome, Outcome, Step, StepStatus};
use tempfile::TempDir;

fn seed_clinic(path: &Path) {
    let conn = Connection::open(path).expect("create db");
    conn.execute_batch(
        "CREATE TABLE patients (id INTEGER PRIMARY KEY, name TEXT, photo BLOB);
         CREATE TABLE visits (id INTEGER PRIMARY KEY AUTOINCREMENT, patient_id INTEGER, note TEXT);
         CREATE INDEX visits_by_patient ON visits (patient_id);
         INSERT INTO patients (name, photo) VALUES ('Ada', x'CAFE'), ('Grace', NULL), ('Alan', NULL);",
    )
    .expect("seed");
}

fn setup(name: &str) -> (TempDir, DiagnoseConfig) {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join(format!("{name}.db"));
    seed_clinic(&db);
    let mut cfg = DiagnoseConfig::for_database(db);
    cfg.echo = false;
    (dir, cfg)
}

fn backups_in(dir: &Path, db_name: &str) -> Vec<PathBuf> {
    let prefix = format!("{db_name}.bak_");
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .collect();
    found.sort();
    found
}

fn csv_shape(path: &Path) -> (Vec<String>, usize) {
    let mut reader = ReaderBuilder::new().from_path(path).expect("open csv");
    let header = reader
        .headers()
        .expect("header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader.records().count();
    (header, rows)
}

#[test]
fn healthy_database_produces_every_artifact() {
    let (dir, cfg) = setup("clinic");
    let summary = diagnose::run(&cfg).expect("run");

    assert_eq!(summary.outcome, Outcome::Healthy);
    assert!(summary.integrity_confirmed());
    for step in [
        Step::Preflight,
        Step::Backup,
        Step::Connect,
        Step::Integrity,
        Step::Schema,
        Step::Inventory,
        Step::Export,
        Step::Dump,
        Step::Vacuum,
    ] {
        assert_eq!(summary.step(step), Some(&StepStatus::Completed), "{step:?}");
    }

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    let lines: Vec<&str> = report.lines().collect();
    let pragma = lines
        .iter()
        .position(|line| *line == "PRAGMA integrity_check result:")
        .expect("integrity header");
    assert_eq!(lines[pragma + 1], "ok");
    assert!(report.contains("Backup created: "));
    assert!(report.contains(" - patients: 3 rows"));
    assert!(report.contains(" - visits: 0 rows"));
    assert!(report.contains("-- index visits_by_patient (visits)"));
    assert!(report.contains("VACUUM completed."));
    assert!(!report.contains("sqlite_sequence:"));

    let (header, rows) = csv_shape(&cfg.export.path_for("patients"));
    assert_eq!(header, vec!["id", "name", "photo"]);
    assert_eq!(rows, 3);
    let (header, rows) = csv_shape(&cfg.export.path_for("visits"));
    assert_eq!(header, vec!["id", "patient_id", "note"]);
    assert_eq!(rows, 0);
    assert!(fs::read_to_string(cfg.export.path_for("patients"))
        .expect("csv")
        .contains("0xcafe"));

    let dump = fs::read_to_string(&cfg.dump_path).expect("dump");
    assert!(dump.starts_with("BEGIN TRANSACTION;"));
    assert!(dump.contains("CREATE TABLE patients"));
    assert!(dump.trim_end().ends_with("COMMIT;"));
    assert_eq!(dir.path().join("clinic_dump.sql"), cfg.dump_path);
}

#[test]
fn backup_matches_original_bytes() {
    let (dir, cfg) = setup("clinic");
    let original = fs::read(&cfg.db_path).expect("read db");
    let summary = diagnose::run(&cfg).expect("run");

    let backup = summary.backup.expect("backup made");
    assert_eq!(backup_files(&dir).len(), 1);
    assert_eq!(fs::read(&backup.path).expect("read backup"), original);
    assert_eq!(backup.bytes, original.len() as u64);
    let name = backup.path.file_name().unwrap().to_string_lossy().into_owned();
    let stamp = name.trim_start_matches("clinic.db.bak_");
    assert_eq!(stamp.len(), "YYYYMMDD_HHMMSS".len());
    assert_eq!(stamp.as_bytes()[8], b'_');
}

fn backup_files(dir: &TempDir) -> Vec<PathBuf> {
    backups_in(dir.path(), "clinic.db")
}

#[test]
fn missing_database_touches_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let mut cfg = DiagnoseConfig::for_database(dir.path().join("hospital.db"));
    cfg.echo = false;

    let summary = diagnose::run(&cfg).expect("run");
    assert_eq!(summary.outcome, Outcome::DatabaseMissing);
    assert_eq!(summary.steps.len(), 1);

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    assert!(report.contains("ERROR: Database file '"));
    assert!(report.contains("not found in current folder"));

    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("db_diagnostic.txt")]);
}

#[test]
fn one_failing_export_does_not_stop_the_rest() {
    let (_dir, cfg) = setup("clinic");
    {
        let conn = Connection::open(&cfg.db_path).expect("open");
        // The slash sends the CSV into a directory that does not exist.
        conn.execute_batch(
            "CREATE TABLE \"archive/old\" (id INTEGER, label TEXT);
             INSERT INTO \"archive/old\" VALUES (1, 'x');",
        )
        .expect("extra table");
    }

    let summary = diagnose::run(&cfg).expect("run");
    assert_eq!(summary.exports.len(), 3);
    let failed: Vec<&str> = summary
        .exports
        .iter()
        .filter(|outcome| matches!(outcome, ExportOutcome::Failed { .. }))
        .map(ExportOutcome::table)
        .collect();
    assert_eq!(failed, vec!["archive/old"]);
    assert_eq!(summary.exported_files().count(), 2);
    assert!(matches!(
        summary.step(Step::Export),
        Some(StepStatus::Failed { .. })
    ));
    // Later steps still ran.
    assert!(summary.dump.is_some());
    assert_eq!(summary.step(Step::Vacuum), Some(&StepStatus::Completed));

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    assert!(report.contains("  FAILED exporting archive/old: "));
    assert!(report.contains("  exported patients -> "));
}

#[test]
fn row_limit_caps_export() {
    let (_dir, mut cfg) = setup("clinic");
    cfg.export.row_limit = 2;
    let summary = diagnose::run(&cfg).expect("run");

    let (_, rows) = csv_shape(&cfg.export.path_for("patients"));
    assert_eq!(rows, 2);
    let counted = summary
        .tables
        .iter()
        .find(|entry| entry.table == "patients")
        .expect("patients counted");
    assert!(matches!(
        counted.count,
        salvage::admin::CountResult::Rows(3)
    ));
}

#[test]
fn repeated_runs_keep_every_backup_and_overwrite_the_rest() {
    let (dir, cfg) = setup("clinic");
    let first = diagnose::run(&cfg).expect("first run");
    fs::write(&cfg.dump_path, "stale").expect("tamper dump");
    let second = diagnose::run(&cfg).expect("second run");

    let first_backup = first.backup.expect("first backup").path;
    let second_backup = second.backup.expect("second backup").path;
    assert_ne!(first_backup, second_backup);
    assert!(first_backup.exists());
    assert_eq!(backup_files(&dir).len(), 2);

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    assert_eq!(report.matches("DB diagnostic run at ").count(), 1);
    let dump = fs::read_to_string(&cfg.dump_path).expect("dump");
    assert!(dump.starts_with("BEGIN TRANSACTION;"));
}

#[test]
fn unopenable_path_ends_after_connect() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("clinic.db");
    fs::create_dir(&db).expect("directory in place of the db");
    let mut cfg = DiagnoseConfig::for_database(db);
    cfg.echo = false;

    let summary = diagnose::run(&cfg).expect("run");
    assert_eq!(summary.outcome, Outcome::ConnectionFailed);
    assert!(matches!(
        summary.step(Step::Backup),
        Some(StepStatus::Failed { .. })
    ));
    assert!(summary.step(Step::Integrity).is_none());
    assert!(!cfg.dump_path.exists());

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    assert!(report.contains("Warning: could not create backup copy: "));
    assert!(report.contains("ERROR: Failed to open DB:"));
}

#[test]
fn unreadable_file_never_gets_vacuumed() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("clinic.db");
    fs::write(&db, "this is a spreadsheet, not a database\n".repeat(200)).expect("write");
    let original = fs::read(&db).expect("read");
    let mut cfg = DiagnoseConfig::for_database(db.clone());
    cfg.echo = false;

    let summary = diagnose::run(&cfg).expect("run");
    assert_ne!(summary.outcome, Outcome::Healthy);
    assert!(summary.vacuum.is_none());
    assert!(!summary.integrity_confirmed());
    assert!(summary.backup.is_some());
    assert_eq!(fs::read(&db).expect("read"), original);

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    assert!(!report.contains("VACUUM completed."));
}

#[test]
fn index_corruption_is_reported_and_blocks_vacuum() {
    let dir = TempDir::new().expect("tempdir");
    let db = dir.path().join("clinic.db");
    {
        let conn = Connection::open(&db).expect("create db");
        conn.execute_batch(
            "CREATE TABLE t (a INTEGER, b INTEGER);
             CREATE INDEX idx_t ON t (a);
             INSERT INTO t VALUES (1, 100), (2, 200), (3, 300);
             PRAGMA writable_schema = ON;
             UPDATE sqlite_master SET sql = 'CREATE INDEX idx_t ON t (b)' WHERE name = 'idx_t';
             PRAGMA writable_schema = OFF;",
        )
        .expect("rewrite index definition");
    }
    let original = fs::read(&db).expect("read db");
    let mut cfg = DiagnoseConfig::for_database(db.clone());
    cfg.echo = false;

    let summary = diagnose::run(&cfg).expect("run");
    assert_eq!(summary.outcome, Outcome::NeedsAttention);
    let integrity = summary.integrity.as_ref().expect("integrity ran");
    assert!(!integrity.healthy);
    assert!(integrity.findings.len() > 1, "{:?}", integrity.findings);
    assert_eq!(
        summary.step(Step::Vacuum),
        Some(&StepStatus::Skipped {
            reason: "integrity not confirmed".to_string()
        })
    );
    assert!(summary.vacuum.is_none());
    assert!(summary.step(Step::Dump).is_some());
    assert_eq!(fs::read(&db).expect("read db"), original);

    let report = fs::read_to_string(&cfg.report_path).expect("report");
    let lines: Vec<&str> = report.lines().collect();
    let header = lines
        .iter()
        .position(|line| *line == "PRAGMA integrity_check result:")
        .expect("integrity header");
    assert_ne!(lines[header + 1], "ok");
    assert!(lines[header + 1..].iter().any(|line| line.contains("idx_t")));
    assert!(report.contains("Attempting SQL dump"));
    assert!(report.contains(
        "Integrity check did NOT return OK. Skipping VACUUM to avoid worsening corruption."
    ));
    assert!(!report.contains("VACUUM completed."));
}
