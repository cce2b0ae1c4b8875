use std::time::Instant;

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::admin::util::database_size_bytes;
use crate::admin::Result;

/// Report generated after a vacuum operation completes.
#[derive(Debug, Clone, Serialize)]
pub struct VacuumReport {
    /// Duration of the vacuum operation in milliseconds.
    pub duration_ms: f64,
    /// Database size before the rebuild, in bytes.
    pub size_before: u64,
    /// Database size after the rebuild, in bytes.
    pub size_after: u64,
    /// Bytes returned to the filesystem.
    pub reclaimed_bytes: u64,
}

/// Rebuilds the database file in place with `VACUUM`.
///
/// Only call this on a file that passed an integrity check; rewriting a
/// damaged file can make recovery harder.
///
/// # Errors
///
/// Returns an error if the size pragmas fail, `VACUUM` fails (for instance
/// because another connection holds a lock), or the trailing commit fails.
pub fn vacuum(conn: &Connection) -> Result<VacuumReport> {
    let size_before = database_size_bytes(conn)?;
    let start = Instant::now();
    conn.execute_batch("VACUUM")?;
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
    }
    let elapsed = start.elapsed();
    let size_after = database_size_bytes(conn)?;

    let report = VacuumReport {
        duration_ms: elapsed.as_secs_f64() * 1_000.0,
        size_before,
        size_after,
        reclaimed_bytes: size_before.saturating_sub(size_after),
    };
    info!(
        size_before = report.size_before,
        size_after = report.size_after,
        reclaimed = report.reclaimed_bytes,
        "VACUUM completed"
    );
    Ok(report)
}
