use std::path::PathBuf;

use csv::WriterBuilder;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;

use crate::admin::{quote_ident, AdminError};

/// Default cap on rows exported per table.
pub const DEFAULT_ROW_LIMIT: usize = 10_000;

/// Configuration for exporting tables to CSV files.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory the CSV files are written into.
    pub dir: PathBuf,
    /// File name prefix; files are named `<prefix>_table_<table>.csv`.
    pub prefix: String,
    /// Maximum number of data rows written per table.
    pub row_limit: usize,
}

impl ExportConfig {
    /// Deterministic output path for a table.
    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}_table_{}.csv", self.prefix, table))
    }
}

/// Summary of a single table export.
#[derive(Debug, Clone, Serialize)]
pub struct TableExport {
    /// Table that was exported.
    pub table: String,
    /// CSV file that was written.
    pub path: PathBuf,
    /// Header row, in catalog order.
    pub columns: Vec<String>,
    /// Number of data rows written.
    pub rows_exported: u64,
}

/// Exports up to `cfg.row_limit` rows of `table` to its CSV file.
///
/// The header row is the column list of the `SELECT *` that produces the
/// data, so generated columns are included. Cells are rendered with
/// [`format_cell`].
///
/// # Errors
///
/// Returns an error if the table cannot be read, a text cell is not valid
/// UTF-8, or the file cannot be written. Nothing is retried.
pub fn export_table(
    conn: &Connection,
    table: &str,
    cfg: &ExportConfig,
) -> Result<TableExport, AdminError> {
    let path = cfg.path_for(table);
    let limit = i64::try_from(cfg.row_limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT ?1", quote_ident(table)))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    if columns.is_empty() {
        return Err(AdminError::Message(format!("no columns found for table '{table}'")));
    }
    let width = columns.len();

    // Fetch before touching the file so a failed read leaves no partial CSV.
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut rows = stmt.query([limit])?;
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(width);
        for (idx, column) in columns.iter().enumerate() {
            let cell = format_cell(row.get_ref(idx)?).map_err(|err| {
                AdminError::Message(format!(
                    "column '{column}' of row {} in '{table}': {err}",
                    records.len() + 1
                ))
            })?;
            record.push(cell);
        }
        records.push(record);
    }

    let mut writer = WriterBuilder::new().from_path(&path)?;
    writer.write_record(&columns)?;
    for record in &records {
        writer.write_record(record)?;
    }
    writer.flush()?;

    Ok(TableExport {
        table: table.to_string(),
        path,
        columns,
        rows_exported: records.len() as u64,
    })
}

/// Renders one SQLite value as CSV cell text.
///
/// # Errors
///
/// Fails on a TEXT value that is not valid UTF-8; the cell is never
/// rewritten with replacement characters.
pub fn format_cell(value: ValueRef<'_>) -> Result<String, std::str::Utf8Error> {
    Ok(match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)?.to_string(),
        ValueRef::Blob(bytes) => format!("0x{}", hex::encode(bytes)),
    })
}
