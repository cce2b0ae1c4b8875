use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::admin::error::{AdminError, Result};
use crate::admin::options::AdminOpenOptions;

/// Opens a single SQLite connection for administrative work.
///
/// The connection is opened read-write with the configured busy timeout.
/// The file is never created: a missing path is an error.
///
/// # Errors
///
/// Returns an error if the database doesn't exist or SQLite refuses to open
/// the file.
pub fn open_connection(path: &Path, opts: &AdminOpenOptions) -> Result<Connection> {
    if !path.exists() {
        return Err(AdminError::missing_database(path));
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    conn.busy_timeout(opts.busy_timeout)?;
    Ok(conn)
}

/// Quotes an identifier for interpolation into SQL text.
pub fn quote_ident(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Quotes a string literal for interpolation into SQL text.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Builds `<path><suffix>` next to `path`, keeping the full file name.
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("database"));
    name.push(suffix);
    let mut output = path.to_path_buf();
    output.set_file_name(name);
    output
}

/// Size of the main database file as reported by the pager pragmas.
pub(crate) fn database_size_bytes(conn: &Connection) -> Result<u64> {
    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
    Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
}
