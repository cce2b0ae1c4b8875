//! Best-effort diagnosis and shallow recovery support for a single SQLite file.
//!
//! The [`diagnose`] workflow backs the file up, runs the engine's integrity
//! check, records the schema and row counts, exports each table to CSV,
//! writes a logical dump and, only when the file checks out clean, vacuums
//! it. The building blocks live in [`admin`] and [`cli`].

pub mod admin;
pub mod cli;
pub mod diagnose;
