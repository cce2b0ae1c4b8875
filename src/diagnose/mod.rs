#![forbid(unsafe_code)]

//! The diagnostic workflow.
//!
//! A run is a fixed, linear sequence of steps against one database file:
//! preflight, backup, connect, integrity scan, schema capture, table
//! inventory, CSV export, logical dump and a gated vacuum. Every step after
//! the connection is best-effort: its failure is written to the report and
//! recorded in the [`DiagnoseSummary`], and the next step still runs. Only a
//! missing file or a failed connection ends the run early, and neither is an
//! error from the caller's point of view.

mod report;
mod summary;

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::admin::{
    backup, dump_to_path, first_finding, open_connection, passes_vacuum_gate, schema_objects,
    table_counts, user_tables, vacuum, verify, AdminError, AdminOpenOptions, CountResult,
    VerifyLevel,
};
use crate::cli::export::{export_table, ExportConfig, DEFAULT_ROW_LIMIT};

pub use report::{error_chain, DiagnosticLog};
pub use summary::{
    DiagnoseSummary, ExportOutcome, Outcome, Step, StepRecord, StepStatus,
};

/// Database file inspected when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "hospital.db";
/// Report file name used when nothing else is configured.
pub const DEFAULT_REPORT: &str = "db_diagnostic.txt";

/// Failures outside the guarded workflow.
#[derive(Debug, Error)]
pub enum DiagnoseError {
    /// The diagnostic report itself could not be written.
    #[error("failed to write diagnostic report {path}")]
    Report {
        /// Report path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Everything a run needs to know. There is no global state.
#[derive(Debug, Clone)]
pub struct DiagnoseConfig {
    /// Database file to inspect.
    pub db_path: PathBuf,
    /// Diagnostic report, truncated at the start of every run.
    pub report_path: PathBuf,
    /// Logical dump destination.
    pub dump_path: PathBuf,
    /// Per-table CSV export settings.
    pub export: ExportConfig,
    /// Connection options (busy timeout).
    pub open: AdminOpenOptions,
    /// Which consistency checker to run.
    pub level: VerifyLevel,
    /// Whether the gated vacuum step may run at all.
    pub vacuum: bool,
    /// Mirror report lines to stdout.
    pub echo: bool,
}

impl Default for DiagnoseConfig {
    fn default() -> Self {
        Self::for_database(DEFAULT_DATABASE)
    }
}

impl DiagnoseConfig {
    /// Configuration for `db_path` with every artifact placed next to it.
    ///
    /// For `data/clinic.db` this yields `data/db_diagnostic.txt`,
    /// `data/clinic_dump.sql` and `data/clinic_table_<table>.csv`.
    pub fn for_database(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let dir = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = db_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        Self {
            report_path: dir.join(DEFAULT_REPORT),
            dump_path: dir.join(format!("{stem}_dump.sql")),
            export: ExportConfig {
                dir,
                prefix: stem,
                row_limit: DEFAULT_ROW_LIMIT,
            },
            db_path,
            open: AdminOpenOptions::default(),
            level: VerifyLevel::default(),
            vacuum: true,
            echo: true,
        }
    }
}

/// Runs the full diagnostic workflow once.
///
/// # Errors
///
/// Only fails when the report file cannot be created or written. Every
/// database-side failure is recorded in the returned summary instead.
pub fn run(cfg: &DiagnoseConfig) -> Result<DiagnoseSummary, DiagnoseError> {
    let started_at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = started_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| started_at.unix_timestamp().to_string());
    let log = DiagnosticLog::create(&cfg.report_path, cfg.echo)?;
    let summary = DiagnoseSummary::new(cfg.db_path.clone(), cfg.report_path.clone(), stamp);
    let mut run = Diagnosis { cfg, log, summary };

    info!(db = %cfg.db_path.display(), report = %cfg.report_path.display(), "diagnostic run started");
    run.log.line(format!("DB diagnostic run at {}", run.summary.started_at))?;

    if !run.preflight()? {
        return run.finish();
    }
    run.backup(started_at)?;
    let Some(conn) = run.connect()? else {
        return run.finish();
    };

    run.integrity(&conn)?;
    run.schema(&conn)?;
    let tables = run.inventory(&conn)?;
    run.export(&conn, &tables)?;
    run.dump(&conn)?;
    run.vacuum(&conn)?;

    if let Err((_, err)) = conn.close() {
        warn!(error = %err, "closing the connection failed");
    }
    run.closing()?;
    run.summary.outcome = if run.summary.integrity_confirmed() && run.summary.dump.is_some() {
        Outcome::Healthy
    } else {
        Outcome::NeedsAttention
    };
    run.finish()
}

struct Diagnosis<'a> {
    cfg: &'a DiagnoseConfig,
    log: DiagnosticLog,
    summary: DiagnoseSummary,
}

impl Diagnosis<'_> {
    fn preflight(&mut self) -> Result<bool, DiagnoseError> {
        let db = &self.cfg.db_path;
        if db.exists() {
            self.summary.record(Step::Preflight, StepStatus::Completed);
            return Ok(true);
        }
        let cwd = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        warn!(db = %db.display(), "database file not found");
        self.log.line(format!(
            "ERROR: Database file '{}' not found in current folder: {cwd}",
            db.display()
        ))?;
        self.log.line(
            "If your DB is somewhere else, move it here or run this tool from the correct folder.",
        )?;
        self.summary.record(
            Step::Preflight,
            StepStatus::failed(AdminError::MissingDatabase(db.clone())),
        );
        self.summary.outcome = Outcome::DatabaseMissing;
        Ok(false)
    }

    fn backup(&mut self, taken_at: OffsetDateTime) -> Result<(), DiagnoseError> {
        match backup(&self.cfg.db_path, taken_at) {
            Ok(report) => {
                self.log
                    .line(format!("Backup created: {}", report.path.display()))?;
                self.summary.backup = Some(report);
                self.summary.record(Step::Backup, StepStatus::Completed);
            }
            Err(err) => {
                warn!(error = %err, "backup failed; continuing");
                self.log
                    .line(format!("Warning: could not create backup copy: {err}"))?;
                self.log
                    .line("You should manually copy the file before proceeding.")?;
                self.summary.record(Step::Backup, StepStatus::failed(&err));
            }
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<Option<Connection>, DiagnoseError> {
        match open_connection(&self.cfg.db_path, &self.cfg.open) {
            Ok(conn) => {
                self.log.line("Opened DB successfully.")?;
                self.summary.record(Step::Connect, StepStatus::Completed);
                Ok(Some(conn))
            }
            Err(err) => {
                warn!(error = %err, "failed to open database");
                self.log.line("ERROR: Failed to open DB:")?;
                self.log.error(&err)?;
                self.summary.record(Step::Connect, StepStatus::failed(&err));
                self.summary.outcome = Outcome::ConnectionFailed;
                Ok(None)
            }
        }
    }

    fn integrity(&mut self, conn: &Connection) -> Result<(), DiagnoseError> {
        let pragma = self.cfg.level.pragma();
        info!(pragma, "running integrity check");
        self.log.blank()?;
        match verify(conn, self.cfg.level) {
            Ok(report) => {
                self.log.line(format!("PRAGMA {pragma} result:"))?;
                for finding in &report.findings {
                    self.log.line(finding)?;
                }
                self.summary.integrity = Some(report);
                self.summary.record(Step::Integrity, StepStatus::Completed);
            }
            Err(err) => {
                warn!(error = %err, "integrity check could not run");
                self.log.line(format!("ERROR running {pragma}:"))?;
                self.log.error(&err)?;
                self.summary.record(Step::Integrity, StepStatus::failed(&err));
            }
        }
        Ok(())
    }

    fn schema(&mut self, conn: &Connection) -> Result<(), DiagnoseError> {
        self.log.blank()?;
        self.log.line("Schema (sqlite_master):")?;
        match schema_objects(conn) {
            Ok(objects) => {
                for object in &objects {
                    self.log.line(format!(
                        "-- {} {} ({})",
                        object.kind, object.name, object.table
                    ))?;
                    self.log.line(&object.sql)?;
                    self.log.blank()?;
                }
                self.summary.schema = objects;
                self.summary.record(Step::Schema, StepStatus::Completed);
            }
            Err(err) => {
                warn!(error = %err, "schema read failed");
                self.log.line("ERROR reading schema:")?;
                self.log.error(&err)?;
                self.summary.record(Step::Schema, StepStatus::failed(&err));
            }
        }
        Ok(())
    }

    fn inventory(&mut self, conn: &Connection) -> Result<Vec<String>, DiagnoseError> {
        self.log.blank()?;
        self.log.line("Tables and row counts:")?;
        let tables = match user_tables(conn) {
            Ok(tables) => tables,
            Err(err) => {
                warn!(error = %err, "listing tables failed");
                self.log.line("ERROR listing tables:")?;
                self.log.error(&err)?;
                self.summary.record(Step::Inventory, StepStatus::failed(&err));
                return Ok(Vec::new());
            }
        };
        if tables.is_empty() {
            self.log.line("No user tables found.")?;
        }
        let counts = table_counts(conn, &tables);
        let mut failures = 0;
        for entry in &counts {
            match &entry.count {
                CountResult::Rows(rows) => {
                    self.log.line(format!(" - {}: {rows} rows", entry.table))?;
                }
                CountResult::Error(message) => {
                    failures += 1;
                    self.log.line(format!(
                        " - {}: ERROR counting rows: {message}",
                        entry.table
                    ))?;
                }
            }
        }
        self.summary.tables = counts;
        let status = if failures == 0 {
            StepStatus::Completed
        } else {
            StepStatus::failed(format!("{failures} of {} tables could not be counted", tables.len()))
        };
        self.summary.record(Step::Inventory, status);
        Ok(tables)
    }

    fn export(&mut self, conn: &Connection, tables: &[String]) -> Result<(), DiagnoseError> {
        self.log.blank()?;
        self.log
            .line("Attempting CSV export of each table (best-effort).")?;
        let mut failures = 0;
        for table in tables {
            match export_table(conn, table, &self.cfg.export) {
                Ok(export) => {
                    self.log.line(format!(
                        "  exported {} -> {} ({} rows exported)",
                        table,
                        export.path.display(),
                        export.rows_exported
                    ))?;
                    self.summary.exports.push(ExportOutcome::Exported(export));
                }
                Err(err) => {
                    failures += 1;
                    warn!(table = %table, error = %err, "table export failed");
                    self.log.line(format!("  FAILED exporting {table}: {err}"))?;
                    self.summary.exports.push(ExportOutcome::Failed {
                        table: table.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }
        let status = if tables.is_empty() {
            StepStatus::skipped("no tables to export")
        } else if failures == 0 {
            StepStatus::Completed
        } else {
            StepStatus::failed(format!("{failures} of {} tables failed to export", tables.len()))
        };
        self.summary.record(Step::Export, status);
        Ok(())
    }

    fn dump(&mut self, conn: &Connection) -> Result<(), DiagnoseError> {
        let path = &self.cfg.dump_path;
        self.log.blank()?;
        self.log.line(format!(
            "Attempting SQL dump (sqlite .dump style) to {}",
            path.display()
        ))?;
        match dump_to_path(conn, path) {
            Ok(report) => {
                self.log
                    .line(format!("SQL dump written to {}", report.path.display()))?;
                self.summary.dump = Some(report);
                self.summary.record(Step::Dump, StepStatus::Completed);
            }
            Err(err) => {
                warn!(error = %err, "SQL dump failed");
                self.log.line(format!("SQL dump failed: {err}"))?;
                self.summary.record(Step::Dump, StepStatus::failed(&err));
            }
        }
        Ok(())
    }

    fn vacuum(&mut self, conn: &Connection) -> Result<(), DiagnoseError> {
        if !self.cfg.vacuum {
            self.log.blank()?;
            self.log.line("VACUUM disabled by configuration; skipping.")?;
            self.summary
                .record(Step::Vacuum, StepStatus::skipped("disabled by configuration"));
            return Ok(());
        }
        // Always a fresh check; the first verdict is not reused.
        match first_finding(conn, self.cfg.level) {
            Ok(first) => self.gated_vacuum(conn, first.as_deref()),
            Err(err) => {
                warn!(error = %err, "integrity re-check failed");
                self.log
                    .line(format!("Error during vacuum/extra checks: {err}"))?;
                self.summary.record(Step::Vacuum, StepStatus::failed(&err));
                Ok(())
            }
        }
    }

    fn gated_vacuum(&mut self, conn: &Connection, first: Option<&str>) -> Result<(), DiagnoseError> {
        self.log.blank()?;
        if !passes_vacuum_gate(first) {
            self.log.line(
                "Integrity check did NOT return OK. Skipping VACUUM to avoid worsening corruption.",
            )?;
            self.summary
                .record(Step::Vacuum, StepStatus::skipped("integrity not confirmed"));
            return Ok(());
        }
        self.log.line(
            "Integrity is OK. Attempting VACUUM to rebuild the database file (may shrink file).",
        )?;
        match vacuum(conn) {
            Ok(report) => {
                self.log.line("VACUUM completed.")?;
                self.summary.vacuum = Some(report);
                self.summary.record(Step::Vacuum, StepStatus::Completed);
            }
            Err(err) => {
                warn!(error = %err, "VACUUM failed");
                self.log.line(format!("VACUUM failed: {err}"))?;
                self.summary.record(Step::Vacuum, StepStatus::failed(&err));
            }
        }
        Ok(())
    }

    fn closing(&mut self) -> Result<(), DiagnoseError> {
        let export = &self.cfg.export;
        self.log.blank()?;
        self.log
            .line("Diagnostic finished. Look at the generated files for details:")?;
        self.log
            .line(format!(" - {}", self.cfg.report_path.display()))?;
        self.log.line(format!(
            " - {} (if created)",
            self.cfg.dump_path.display()
        ))?;
        self.log.line(format!(
            " - {} (per-table CSVs)",
            export.dir.join(format!("{}_table_<name>.csv", export.prefix)).display()
        ))?;
        self.log.blank()?;

        let healthy = self.summary.integrity_confirmed() && self.summary.dump.is_some();
        if healthy {
            self.log.line(
                "No corruption was reported. Keep the backup until you have confirmed the application works.",
            )?;
        } else {
            self.log.line(format!(
                "If integrity_check reported corruption or dump failed, keep the backup and share the last part of {} before attempting any repair.",
                self.cfg.report_path.display()
            ))?;
        }
        if self.summary.exported_files().next().is_some() {
            self.log
                .line("If CSVs were produced, you can use them to rebuild a fresh DB.")?;
        }
        Ok(())
    }

    fn finish(self) -> Result<DiagnoseSummary, DiagnoseError> {
        let lines = self.log.finish()?;
        info!(
            outcome = ?self.summary.outcome,
            report_lines = lines,
            "diagnostic run finished"
        );
        Ok(self.summary)
    }
}
