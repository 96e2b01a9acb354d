//! JSON report writer.
//!
//! Buffers completion records and writes a single [`LatencyReport`]
//! document, with run diagnostics, when the run finishes.

use super::ResultSink;
use crate::correlator::{CompletionRecord, RunSummary};
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::OutputError;
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

/// Top-level report structure written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Trace the report was built from
    pub source: String,

    /// RFC 3339 timestamp when the report was generated
    pub generated_at: String,

    pub summary: RunSummary,

    pub completions: Vec<CompletionRecord>,
}

/// Collects records and writes a [`LatencyReport`] on finish
#[derive(Debug)]
pub struct JsonSink<W: Write> {
    writer: W,
    source: String,
    completions: Vec<CompletionRecord>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W, source: impl Into<String>) -> Self {
        Self {
            writer,
            source: source.into(),
            completions: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn emit(&mut self, record: &CompletionRecord) -> Result<(), OutputError> {
        self.completions.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<(), OutputError> {
        let report = LatencyReport {
            version: SCHEMA_VERSION.to_string(),
            source: self.source.clone(),
            generated_at: Utc::now().to_rfc3339(),
            summary: summary.clone(),
            completions: std::mem::take(&mut self.completions),
        };

        debug!("Writing JSON report with {} completions", report.completions.len());

        serde_json::to_writer_pretty(&mut self.writer, &report)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read a report from a JSON file
///
/// **Public** - used by the validate command and tests
pub fn read_report(input_path: impl AsRef<Path>) -> Result<LatencyReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let report: LatencyReport =
        serde_json::from_reader(BufReader::new(file)).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Report loaded: version {}, {} completions",
        report.version,
        report.completions.len()
    );

    Ok(report)
}
