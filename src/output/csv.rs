//! Legacy CSV writer.
//!
//! Produces `number,opcode,tag,lba,xfrlen,Completion time,response` rows
//! terminated by CRLF, quoting a field only when it contains a delimiter,
//! a quote or a line break.

use super::ResultSink;
use crate::correlator::{CompletionRecord, RunSummary};
use crate::utils::config::CSV_HEADER;
use crate::utils::error::OutputError;
use std::borrow::Cow;
use std::io::Write;

const LINE_TERMINATOR: &str = "\r\n";

/// Streams completion records as CSV rows
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: W,
    header_written: bool,
    rows: u64,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
            rows: 0,
        }
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_header(&mut self) -> Result<(), OutputError> {
        if !self.header_written {
            write_row(&mut self.writer, CSV_HEADER.iter().copied())?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn emit(&mut self, record: &CompletionRecord) -> Result<(), OutputError> {
        self.ensure_header()?;

        let number = record.sequence_number.to_string();
        let dispatched = record.dispatch_timestamp_micros.to_string();
        let response = record.duration_micros.to_string();

        write_row(
            &mut self.writer,
            [
                number.as_str(),
                record.opcode_hex(),
                record.tag.as_str(),
                record.lba_hex.as_str(),
                record.length_hex.as_str(),
                dispatched.as_str(),
                response.as_str(),
            ],
        )?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<(), OutputError> {
        // Header is written even when nothing matched
        self.ensure_header()?;
        self.writer.flush()?;
        Ok(())
    }
}

fn write_row<'a, W, I>(writer: &mut W, fields: I) -> Result<(), OutputError>
where
    W: Write,
    I: IntoIterator<Item = &'a str>,
{
    let row = fields
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(",");
    writer.write_all(row.as_bytes())?;
    writer.write_all(LINE_TERMINATOR.as_bytes())?;
    Ok(())
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
