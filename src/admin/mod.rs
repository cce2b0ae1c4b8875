#![forbid(unsafe_code)]

//! Database administration and maintenance utilities.
//!
//! This module wraps the SQLite engine's own maintenance primitives: file
//! backup, integrity verification, catalog inspection, logical dumps and
//! vacuum. Every operation works on a single connection and reports what it
//! did through a serializable report type.

mod backup;
mod dump;
mod error;
mod options;
mod schema;
mod util;
mod vacuum;
mod verify;

/// Timestamped byte-for-byte copies of the database file.
pub use backup::{backup, backup_stamp, BackupReport};

/// Logical dump of the whole database to a SQL reconstruction script.
pub use dump::{dump_to_path, write_dump, DumpReport};

/// Error types for administrative operations.
///
/// Defines error conditions that can occur during administrative tasks.
pub use error::{AdminError, Result};

/// Configuration options for opening a database in admin mode.
///
/// Controls how the database is opened for administrative operations.
pub use options::{AdminOpenOptions, DEFAULT_BUSY_TIMEOUT};

/// Catalog inspection: schema objects, user tables, row counts and columns.
pub use schema::{
    row_count, schema_objects, table_columns, table_counts, user_tables, CountResult,
    SchemaObject, TableCount,
};

/// Database vacuum (defragmentation) operations.
///
/// Vacuum reclaims unused space in the database file and can optimize data layout.
pub use vacuum::{vacuum, VacuumReport};

/// Database integrity verification.
///
/// Verifies the structural integrity of the database and reports any issues found.
pub use verify::{
    first_finding, is_healthy, passes_vacuum_gate, verify, VerifyLevel, VerifyReport,
};

/// Utility functions for opening the database.
pub use util::{open_connection, quote_ident};
