use std::error::Error;
use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use crate::admin::AdminError;
use crate::diagnose::DiagnoseError;

/// The diagnostic report: a text file written one line at a time.
///
/// Every line is flushed as soon as it is written so an abrupt exit keeps
/// everything up to that point. When `echo` is set each line is mirrored to
/// stdout.
pub struct DiagnosticLog {
    path: PathBuf,
    out: LineWriter<File>,
    echo: bool,
    lines: u64,
}

impl DiagnosticLog {
    /// Creates the report, truncating any report left by an earlier run.
    pub fn create(path: impl AsRef<Path>, echo: bool) -> Result<Self, DiagnoseError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| DiagnoseError::Report {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            out: LineWriter::new(file),
            echo,
            lines: 0,
        })
    }

    /// Appends one line.
    pub fn line(&mut self, text: impl AsRef<str>) -> Result<(), DiagnoseError> {
        let text = text.as_ref();
        writeln!(self.out, "{text}").map_err(|source| DiagnoseError::Report {
            path: self.path.clone(),
            source,
        })?;
        if self.echo {
            println!("{text}");
        }
        self.lines += 1;
        Ok(())
    }

    /// Appends an empty line.
    pub fn blank(&mut self) -> Result<(), DiagnoseError> {
        self.line("")
    }

    /// Appends an error message followed by its cause chain.
    pub fn error(&mut self, err: &AdminError) -> Result<(), DiagnoseError> {
        for line in error_chain(err) {
            self.line(line)?;
        }
        Ok(())
    }

    /// Flushes the report and closes the file.
    pub fn finish(mut self) -> Result<u64, DiagnoseError> {
        self.out.flush().map_err(|source| DiagnoseError::Report {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.lines)
    }
}

/// Renders an error and each of its sources, one per line.
///
/// This is the report's equivalent of a stack trace.
pub fn error_chain(err: &(dyn Error + 'static)) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("  caused by: {cause}"));
        source = cause.source();
    }
    lines
}
