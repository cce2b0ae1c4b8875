#![forbid(unsafe_code)]

//! Flat-file export of table contents.
//!
//! Each table is written to its own CSV file so a failure on one table never
//! affects the others.

/// Per-table CSV export.
pub mod export;
