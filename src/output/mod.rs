//! Result sinks for completion records.
//!
//! This module handles writing correlation results:
//! - Legacy CSV (byte-compatible with the original report format)
//! - JSON reports with run diagnostics
//! - Output path validation and creation

pub mod csv;
pub mod json;

use crate::correlator::{CompletionRecord, RunSummary};
use crate::utils::error::OutputError;
use log::debug;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

// Re-export main types
pub use self::csv::CsvSink;
pub use self::json::{read_report, JsonSink, LatencyReport};

/// Receives completion records in increasing sequence order
pub trait ResultSink {
    fn emit(&mut self, record: &CompletionRecord) -> Result<(), OutputError>;

    /// Called once after the last record
    fn finish(&mut self, _summary: &RunSummary) -> Result<(), OutputError> {
        Ok(())
    }
}

/// In-memory sink, mostly for tests and library callers
impl ResultSink for Vec<CompletionRecord> {
    fn emit(&mut self, record: &CompletionRecord) -> Result<(), OutputError> {
        self.push(record.clone());
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn emit(&mut self, record: &CompletionRecord) -> Result<(), OutputError> {
        (**self).emit(record)
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), OutputError> {
        (**self).finish(summary)
    }
}

/// Output format selectable from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Open `path` for writing, or stdout when `path` is `None` or `-`
///
/// Parent directories are created as needed.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>, OutputError> {
    let Some(path) = path.filter(|p| p.as_os_str() != "-") else {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    };

    validate_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(path).map_err(OutputError::WriteFailed)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Validate that an output path is writable
pub fn validate_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}
