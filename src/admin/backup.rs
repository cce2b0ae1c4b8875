use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::admin::util::sibling_path;
use crate::admin::{AdminError, Result};

/// Upper bound on `_n` suffixes tried when a backup name is already taken.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Report generated after a backup copy completes.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    /// Path of the newly written backup.
    pub path: PathBuf,
    /// Number of bytes copied.
    pub bytes: u64,
}

/// Formats the run timestamp used in backup names.
pub fn backup_stamp(at: OffsetDateTime) -> String {
    let stamp = format_description!("[year][month][day]_[hour][minute][second]");
    // Only numeric components, so formatting cannot fail.
    at.format(stamp)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Copies the database file to `<path>.bak_<YYYYMMDD_HHMMSS>`.
///
/// An existing backup is never overwritten. If the stamped name is taken
/// (two runs within the same second), `_1`, `_2`, ... are appended until a
/// free name is found.
///
/// # Errors
///
/// Returns an error if the source is missing, no free name can be found, or
/// the copy itself fails.
pub fn backup(path: impl AsRef<Path>, taken_at: OffsetDateTime) -> Result<BackupReport> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AdminError::missing_database(path));
    }
    let target = unique_backup_path(path, &backup_stamp(taken_at))?;
    debug!(src = %path.display(), dst = %target.display(), "copying database");
    let bytes = fs::copy(path, &target)?;
    info!(path = %target.display(), bytes, "backup created");
    Ok(BackupReport {
        path: target,
        bytes,
    })
}

fn unique_backup_path(path: &Path, stamp: &str) -> Result<PathBuf> {
    let base = format!(".bak_{stamp}");
    let candidate = sibling_path(path, &base);
    if !candidate.exists() {
        return Ok(candidate);
    }
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = sibling_path(path, &format!("{base}_{attempt}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(AdminError::Message(format!(
        "unable to allocate a backup name for {} at {stamp}",
        path.display()
    )))
}
