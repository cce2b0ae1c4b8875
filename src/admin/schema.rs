use rusqlite::Connection;
use serde::Serialize;

use crate::admin::util::quote_ident;
use crate::admin::Result;

/// One row of `sqlite_master` with a stored definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaObject {
    /// Object type: `table`, `index`, `view` or `trigger`.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Table the object belongs to.
    pub table: String,
    /// The `CREATE` statement exactly as stored.
    pub sql: String,
}

/// Row count of a single user table.
#[derive(Clone, Debug, Serialize)]
pub struct TableCount {
    /// Table name.
    pub table: String,
    /// Number of rows, or the error that prevented counting.
    #[serde(flatten)]
    pub count: CountResult,
}

/// Outcome of counting one table.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountResult {
    /// The table was counted.
    Rows(u64),
    /// `SELECT count(*)` failed for this table.
    Error(String),
}

/// Returns every catalog object with a non-null definition, ordered by type then name.
pub fn schema_objects(conn: &Connection) -> Result<Vec<SchemaObject>> {
    let mut stmt = conn.prepare(
        "SELECT type, name, tbl_name, sql FROM sqlite_master \
         WHERE sql IS NOT NULL ORDER BY type, name",
    )?;
    let objects = stmt
        .query_map([], |row| {
            Ok(SchemaObject {
                kind: row.get(0)?,
                name: row.get(1)?,
                table: row.get(2)?,
                sql: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(objects)
}

/// Lists user tables, skipping the engine's reserved `sqlite_` namespace.
pub fn user_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tables)
}

/// Counts the rows of one table.
pub fn row_count(conn: &Connection, table: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        &format!("SELECT count(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Counts every table independently; a failure only affects its own entry.
pub fn table_counts(conn: &Connection, tables: &[String]) -> Vec<TableCount> {
    tables
        .iter()
        .map(|table| TableCount {
            table: table.clone(),
            count: match row_count(conn, table) {
                Ok(rows) => CountResult::Rows(rows),
                Err(err) => CountResult::Error(err.to_string()),
            },
        })
        .collect()
}

/// Column names of a table in catalog order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}
