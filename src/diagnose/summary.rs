use std::path::PathBuf;

use serde::Serialize;

use crate::admin::{
    BackupReport, DumpReport, SchemaObject, TableCount, VacuumReport, VerifyReport,
};
use crate::cli::export::TableExport;

/// The fixed steps of a diagnostic run, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Check the database file exists.
    Preflight,
    /// Copy the file to a timestamped sibling.
    Backup,
    /// Open the single connection.
    Connect,
    /// Run the consistency checker.
    Integrity,
    /// Read the catalog definitions.
    Schema,
    /// List tables and count their rows.
    Inventory,
    /// Write per-table CSV files.
    Export,
    /// Write the logical dump.
    Dump,
    /// Re-check integrity and compact the file.
    Vacuum,
}

/// How a single step ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    /// The step did what it set out to do.
    Completed,
    /// The step was deliberately not attempted.
    Skipped {
        /// Why the step was skipped.
        reason: String,
    },
    /// The step was attempted and failed; the run continued.
    Failed {
        /// Error text.
        message: String,
    },
}

impl StepStatus {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        StepStatus::Skipped {
            reason: reason.into(),
        }
    }

    pub(crate) fn failed(message: impl ToString) -> Self {
        StepStatus::Failed {
            message: message.to_string(),
        }
    }

    /// Whether the step ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed)
    }
}

/// Outcome of one step.
#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    /// Which step.
    pub step: Step,
    /// How it ended.
    #[serde(flatten)]
    pub status: StepStatus,
}

/// Result of exporting one table.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// The CSV file was written.
    Exported(TableExport),
    /// The export failed; other tables were unaffected.
    Failed {
        /// Table that failed.
        table: String,
        /// Error text.
        message: String,
    },
}

impl ExportOutcome {
    /// Name of the table this outcome refers to.
    pub fn table(&self) -> &str {
        match self {
            ExportOutcome::Exported(export) => &export.table,
            ExportOutcome::Failed { table, .. } => table,
        }
    }
}

/// Overall verdict of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The database file did not exist; nothing else ran.
    DatabaseMissing,
    /// The file exists but could not be opened.
    ConnectionFailed,
    /// Integrity confirmed and the dump succeeded.
    Healthy,
    /// Integrity not confirmed or the dump failed; a human should look.
    NeedsAttention,
}

/// Everything one run produced, in a serializable form.
#[derive(Clone, Debug, Serialize)]
pub struct DiagnoseSummary {
    /// Database that was inspected.
    pub database: PathBuf,
    /// Diagnostic report path.
    pub report: PathBuf,
    /// Run start time, RFC 3339.
    pub started_at: String,
    /// Overall verdict.
    pub outcome: Outcome,
    /// Per-step outcomes in execution order.
    pub steps: Vec<StepRecord>,
    /// Backup copy, when one was made.
    pub backup: Option<BackupReport>,
    /// First integrity check.
    pub integrity: Option<VerifyReport>,
    /// Catalog objects with definitions.
    pub schema: Vec<SchemaObject>,
    /// Row counts per user table.
    pub tables: Vec<TableCount>,
    /// Per-table CSV exports.
    pub exports: Vec<ExportOutcome>,
    /// Logical dump, when it succeeded.
    pub dump: Option<DumpReport>,
    /// Compaction, when it ran and succeeded.
    pub vacuum: Option<VacuumReport>,
}

impl DiagnoseSummary {
    pub(crate) fn new(database: PathBuf, report: PathBuf, started_at: String) -> Self {
        Self {
            database,
            report,
            started_at,
            outcome: Outcome::NeedsAttention,
            steps: Vec::new(),
            backup: None,
            integrity: None,
            schema: Vec::new(),
            tables: Vec::new(),
            exports: Vec::new(),
            dump: None,
            vacuum: None,
        }
    }

    pub(crate) fn record(&mut self, step: Step, status: StepStatus) {
        self.steps.push(StepRecord { step, status });
    }

    /// Status recorded for `step`, if the run reached it.
    pub fn step(&self, step: Step) -> Option<&StepStatus> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.status)
    }

    /// Paths of every CSV file written during the run.
    pub fn exported_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.exports.iter().filter_map(|outcome| match outcome {
            ExportOutcome::Exported(export) => Some(&export.path),
            ExportOutcome::Failed { .. } => None,
        })
    }

    /// Whether the first integrity check confirmed health.
    pub fn integrity_confirmed(&self) -> bool {
        self.integrity.as_ref().is_some_and(|report| report.healthy)
    }
}
