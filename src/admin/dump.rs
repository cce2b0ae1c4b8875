use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::admin::schema::table_columns;
use crate::admin::util::{ensure_parent_dir, quote_ident, quote_literal};
use crate::admin::Result;

/// Report generated after a logical dump completes.
#[derive(Debug, Clone, Serialize)]
pub struct DumpReport {
    /// Path of the written script.
    pub path: PathBuf,
    /// Number of statements written.
    pub statements: u64,
    /// Number of tables whose rows were dumped.
    pub tables: u64,
    /// Duration of the dump in milliseconds.
    pub duration_ms: f64,
}

/// Writes the full reconstruction script for the database to `path`.
///
/// The output matches the shape of the sqlite shell's `.dump`: the whole
/// script is wrapped in one transaction, tables come first with their rows,
/// followed by indexes, triggers and views. Nothing is capped.
///
/// # Errors
///
/// Returns an error if the file cannot be created or any catalog or table
/// read fails. A partially written file is left in place.
pub fn dump_to_path(conn: &Connection, path: impl AsRef<Path>) -> Result<DumpReport> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let start = Instant::now();
    let mut out = BufWriter::new(File::create(path)?);
    let (statements, tables) = write_dump(conn, &mut out)?;
    out.flush()?;
    let report = DumpReport {
        path: path.to_path_buf(),
        statements,
        tables,
        duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
    };
    info!(
        path = %report.path.display(),
        statements = report.statements,
        tables = report.tables,
        "logical dump written"
    );
    Ok(report)
}

/// Streams the reconstruction script into `out`, one statement per line.
///
/// Returns the number of statements and the number of tables dumped.
pub fn write_dump<W: Write>(conn: &Connection, out: &mut W) -> Result<(u64, u64)> {
    let mut dump = DumpWriter { out, statements: 0 };
    let mut tables = 0;
    let mut writable_schema = false;
    let mut sequence: Vec<String> = Vec::new();

    dump.line("BEGIN TRANSACTION;")?;

    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master \
         WHERE sql NOT NULL AND type == 'table' ORDER BY name",
    )?;
    let schema = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (name, sql) in schema {
        if name == "sqlite_sequence" {
            sequence = sequence_statements(conn)?;
            continue;
        } else if name == "sqlite_stat1" {
            dump.line("ANALYZE \"sqlite_master\";")?;
        } else if name.starts_with("sqlite_") {
            debug!(table = %name, "skipping reserved table");
            continue;
        } else if sql.starts_with("CREATE VIRTUAL TABLE") {
            if !writable_schema {
                writable_schema = true;
                dump.line("PRAGMA writable_schema=ON;")?;
            }
            dump.line(&format!(
                "INSERT INTO sqlite_master(type,name,tbl_name,rootpage,sql) VALUES('table',{name},{name},0,{sql});",
                name = quote_literal(&name),
                sql = quote_literal(&sql),
            ))?;
        } else {
            dump.line(&format!("{sql};"))?;
        }

        dump_rows(conn, &name, &mut dump)?;
        tables += 1;
    }

    let mut stmt = conn.prepare(
        "SELECT sql FROM sqlite_master \
         WHERE sql NOT NULL AND type IN ('index', 'trigger', 'view')",
    )?;
    let others = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for sql in others {
        dump.line(&format!("{sql};"))?;
    }

    if writable_schema {
        dump.line("PRAGMA writable_schema=OFF;")?;
    }
    for statement in &sequence {
        dump.line(statement)?;
    }
    dump.line("COMMIT;")?;

    Ok((dump.statements, tables))
}

struct DumpWriter<'a, W: Write> {
    out: &'a mut W,
    statements: u64,
}

impl<W: Write> DumpWriter<'_, W> {
    fn line(&mut self, statement: &str) -> Result<()> {
        writeln!(self.out, "{statement}")?;
        self.statements += 1;
        Ok(())
    }
}

fn dump_rows<W: Write>(conn: &Connection, table: &str, dump: &mut DumpWriter<'_, W>) -> Result<()> {
    let columns = table_columns(conn, table)?;
    let values = columns
        .iter()
        .map(|col| format!("'||quote({})||'", quote_ident(col)))
        .collect::<Vec<_>>()
        .join(",");
    let ident = quote_ident(table);
    // The table name appears once inside a string literal and once as an identifier.
    let literal_ident = ident.replace('\'', "''");
    let query = format!("SELECT 'INSERT INTO {literal_ident} VALUES({values})' FROM {ident}");
    let mut stmt = conn.prepare(&query)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let insert: String = row.get(0)?;
        dump.line(&format!("{insert};"))?;
    }
    Ok(())
}

fn sequence_statements(conn: &Connection) -> Result<Vec<String>> {
    let mut statements = vec!["DELETE FROM \"sqlite_sequence\";".to_string()];
    let mut stmt = conn.prepare("SELECT name, seq FROM \"sqlite_sequence\"")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (name, seq) in rows {
        statements.push(format!(
            "INSERT INTO \"sqlite_sequence\" VALUES({},{seq});",
            quote_literal(&name)
        ));
    }
    Ok(statements)
}
