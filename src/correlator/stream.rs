//! Drives lines from a reader through parser, correlator and sink.
//!
//! Reading can happen inline or on a separate thread feeding a bounded
//! channel. Either way lines reach the correlator in input order.

use super::engine::{CorrelationStats, Correlator};
use crate::output::ResultSink;
use crate::parser::{is_summary_marker, parse_line};
use crate::utils::config::DEFAULT_CHANNEL_CAPACITY;
use crate::utils::error::{CorrelateError, ParseError};
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};
use std::ops::ControlFlow;
use std::thread;

/// How the input stream is consumed
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Stop after this many input lines
    pub limit: Option<usize>,
    /// Read on a separate thread
    pub threaded: bool,
    /// Depth of the reader -> correlator channel when `threaded`
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            limit: None,
            threaded: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Diagnostics for one correlation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub lines_read: u64,
    pub parsed: u64,
    pub malformed_lines: u64,
    /// Input ended at blkparse's summary section
    pub stopped_at_summary: bool,
    pub limit_reached: bool,
    pub correlation: CorrelationStats,
}

impl RunSummary {
    pub fn matched(&self) -> u64 {
        self.correlation.matched
    }
}

/// Correlate every event line in `reader`, emitting matches into `sink`
///
/// **Public** - main entry point for a correlation run
///
/// The sink is finished (flushed) before returning, including when the
/// reader fails part way through.
///
/// # Errors
/// * `CorrelateError::ReadFailed` - the reader failed mid-stream
/// * `CorrelateError::Output` - the sink failed to write
/// * `CorrelateError::ReaderPanicked` - the reader thread died
pub fn correlate_stream<R, S>(
    reader: R,
    correlator: &mut Correlator,
    sink: &mut S,
    options: &StreamOptions,
) -> Result<RunSummary, CorrelateError>
where
    R: BufRead + Send,
    S: ResultSink + ?Sized,
{
    let mut driver = LineDriver {
        correlator,
        sink,
        limit: options.limit,
        summary: RunSummary::default(),
    };

    let outcome = if options.threaded {
        debug!(
            "Reading on a separate thread (channel capacity {})",
            options.channel_capacity
        );
        run_threaded(reader, &mut driver, options.channel_capacity.max(1))
    } else {
        run_inline(reader, &mut driver)
    };

    let LineDriver {
        correlator,
        sink,
        mut summary,
        ..
    } = driver;
    summary.correlation = correlator.stats();

    if let Err(e) = outcome {
        // Keep what was already matched unless the sink itself is broken
        if !matches!(e, CorrelateError::Output(_)) {
            warn!(
                "Input ended early after {} lines, keeping {} matched completions",
                summary.lines_read, summary.correlation.matched
            );
            if let Err(finish_err) = sink.finish(&summary) {
                warn!("Failed to finish output after read error: {}", finish_err);
            }
        }
        return Err(e);
    }

    if summary.malformed_lines > 0 {
        warn!("Skipped {} malformed lines", summary.malformed_lines);
    }
    info!(
        "Matched {} completions from {} lines ({} dispatches still outstanding)",
        summary.correlation.matched, summary.lines_read, summary.correlation.outstanding
    );

    sink.finish(&summary)?;
    Ok(summary)
}

struct LineDriver<'a, S: ?Sized> {
    correlator: &'a mut Correlator,
    sink: &'a mut S,
    limit: Option<usize>,
    summary: RunSummary,
}

impl<S: ResultSink + ?Sized> LineDriver<'_, S> {
    fn limit_reached(&mut self) -> bool {
        let reached = self
            .limit
            .is_some_and(|limit| self.summary.lines_read >= limit as u64);
        if reached {
            self.summary.limit_reached = true;
        }
        reached
    }

    fn handle_line(&mut self, line: &str) -> Result<ControlFlow<()>, CorrelateError> {
        if is_summary_marker(line) {
            debug!("Summary section reached: {}", line.trim());
            self.summary.stopped_at_summary = true;
            return Ok(ControlFlow::Break(()));
        }
        self.summary.lines_read += 1;

        let outcome = parse_line(line).and_then(|record| {
            self.summary.parsed += 1;
            self.correlator.process(&record)
        });

        match outcome {
            Ok(Some(completion)) => self.sink.emit(&completion)?,
            Ok(None) => {}
            Err(e) => self.malformed(line, &e),
        }

        if self.limit_reached() {
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }

    fn malformed(&mut self, line: &str, error: &ParseError) {
        self.summary.malformed_lines += 1;
        debug!(
            "Skipping malformed line {}: {} ({:?})",
            self.summary.lines_read,
            error,
            line.trim_end()
        );
    }
}

fn run_inline<R, S>(mut reader: R, driver: &mut LineDriver<'_, S>) -> Result<(), CorrelateError>
where
    R: BufRead,
    S: ResultSink + ?Sized,
{
    if driver.limit_reached() {
        return Ok(());
    }

    let mut buf = Vec::new();
    while let Some(line) = next_line(&mut reader, &mut buf).map_err(CorrelateError::ReadFailed)? {
        if driver.handle_line(&line)?.is_break() {
            break;
        }
    }
    Ok(())
}

fn run_threaded<R, S>(
    reader: R,
    driver: &mut LineDriver<'_, S>,
    capacity: usize,
) -> Result<(), CorrelateError>
where
    R: BufRead + Send,
    S: ResultSink + ?Sized,
{
    if driver.limit_reached() {
        return Ok(());
    }

    thread::scope(|scope| {
        let (tx, rx) = bounded(capacity);
        let handle = scope.spawn(move || produce_lines(reader, tx));

        // Dropping the receiver on an early stop unblocks the producer
        let result = consume_lines(rx, driver);

        handle
            .join()
            .map_err(|_| CorrelateError::ReaderPanicked)?;
        result
    })
}

fn produce_lines<R: BufRead>(mut reader: R, tx: Sender<io::Result<String>>) {
    let mut buf = Vec::new();
    loop {
        let item = match next_line(&mut reader, &mut buf) {
            Ok(Some(line)) => Ok(line),
            Ok(None) => return,
            Err(e) => Err(e),
        };
        let failed = item.is_err();
        if tx.send(item).is_err() || failed {
            return;
        }
    }
}

fn consume_lines<S>(
    rx: Receiver<io::Result<String>>,
    driver: &mut LineDriver<'_, S>,
) -> Result<(), CorrelateError>
where
    S: ResultSink + ?Sized,
{
    for item in rx {
        let line = item.map_err(CorrelateError::ReadFailed)?;
        if driver.handle_line(&line)?.is_break() {
            break;
        }
    }
    Ok(())
}

/// Read one line, dropping invalid UTF-8 rather than failing
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(strip_invalid_utf8(buf)))
}

/// Decode `bytes`, skipping every invalid sequence instead of substituting
/// U+FFFD, so a corrupt byte inside a column leaves the rest of it intact
fn strip_invalid_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    Some(len) => rest = &after[len..],
                    // Truncated sequence at the end of the line
                    None => return out,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::CompletionRecord;
    use crate::output::{JsonSink, LatencyReport};
    use std::io::{Cursor, Read};

    const TRACE: &str = "\
  8,0    0        1     0.000100000   10  Q   R 2048 + 8 [fio]
  8,0    0        2     0.000200000   10  D   R 2048 + 8 [fio]
  8,0    0        3     0.000250000   11  D   W 4096 + 16 [fio]
garbage
  8,0    0        4     0.000900000    0  C   R 2048 + 8 [0]
  8,0    0        5     0.001250000    0  C   W 4096 + 16 [0]
CPU0 (sda):
 Reads Queued:           1,        4KiB
  8,0    0        6     0.002000000   10  D   R 8192 + 8 [fio]
";

    fn run(options: StreamOptions) -> (RunSummary, Vec<CompletionRecord>) {
        let mut correlator = Correlator::new();
        let mut sink: Vec<CompletionRecord> = Vec::new();
        let summary =
            correlate_stream(Cursor::new(TRACE), &mut correlator, &mut sink, &options).unwrap();
        (summary, sink)
    }

    #[test]
    fn test_inline_run() {
        let (summary, records) = run(StreamOptions::default());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].duration_micros, 700);
        assert_eq!(records[1].duration_micros, 1000);
        assert!(summary.stopped_at_summary);
        // "CPU0 (sda):" has too few fields
        assert_eq!(summary.malformed_lines, 2);
        assert_eq!(summary.correlation.ignored, 1);
        assert_eq!(summary.correlation.dispatches, 2);
        assert_eq!(summary.correlation.outstanding, 0);
    }

    #[test]
    fn test_threaded_matches_inline() {
        let (inline_summary, inline_records) = run(StreamOptions::default());
        let (threaded_summary, threaded_records) = run(StreamOptions {
            threaded: true,
            channel_capacity: 1,
            ..StreamOptions::default()
        });

        assert_eq!(inline_records, threaded_records);
        assert_eq!(inline_summary, threaded_summary);
    }

    #[test]
    fn test_limit_stops_early() {
        let (summary, records) = run(StreamOptions {
            limit: Some(3),
            ..StreamOptions::default()
        });
        assert!(records.is_empty());
        assert!(summary.limit_reached);
        assert_eq!(summary.lines_read, 3);
        assert_eq!(summary.correlation.outstanding, 2);
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut input = b"8,0 0 1 1.0 1 D R 8 + 8 [\xff\xfe]\n".to_vec();
        input.extend_from_slice(b"8,0 0 2 1.5 1 C R 8 + 8 [x]\n");

        let mut correlator = Correlator::new();
        let mut sink: Vec<CompletionRecord> = Vec::new();
        let summary = correlate_stream(
            Cursor::new(input),
            &mut correlator,
            &mut sink,
            &StreamOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.malformed_lines, 0);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].duration_micros, 500_000);
    }

    #[test]
    fn test_invalid_utf8_inside_column_is_dropped() {
        let mut input = b"8,0 0 1 1.0 1 D W\xff 8 + 8 [fio]\n".to_vec();
        input.extend_from_slice(b"8,0 0 2 1.5 1 C W 8\xc3 + 8 [x]\n");

        let mut correlator = Correlator::new();
        let mut sink: Vec<CompletionRecord> = Vec::new();
        let summary = correlate_stream(
            Cursor::new(input),
            &mut correlator,
            &mut sink,
            &StreamOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.malformed_lines, 0);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].tag, "W_8_8");
        assert_eq!(sink[0].lba_hex, "0x8");
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device went away"))
        }
    }

    fn run_until_read_error(threaded: bool) -> LatencyReport {
        let input = io::BufReader::new(
            Cursor::new(
                "8,0 0 1 1.0 1 D R 8 + 8 [fio]\n\
                 8,0 0 2 1.5 1 C R 8 + 8 [0]\n\
                 8,0 0 3 1.6 1 D W 16 + 8 [fio]\n",
            )
            .chain(BrokenReader),
        );
        let options = StreamOptions {
            threaded,
            ..StreamOptions::default()
        };

        let mut correlator = Correlator::new();
        let mut sink = JsonSink::new(Vec::new(), "broken");
        let err = correlate_stream(input, &mut correlator, &mut sink, &options).unwrap_err();
        assert!(matches!(err, CorrelateError::ReadFailed(_)));

        serde_json::from_slice(&sink.into_inner()).unwrap()
    }

    #[test]
    fn test_read_error_keeps_matched_completions() {
        for threaded in [false, true] {
            let report = run_until_read_error(threaded);
            assert_eq!(report.completions.len(), 1);
            assert_eq!(report.completions[0].duration_micros, 500_000);
            assert_eq!(report.summary.lines_read, 3);
            assert_eq!(report.summary.correlation.outstanding, 1);
        }
    }

    #[test]
    fn test_strip_invalid_utf8() {
        assert_eq!(strip_invalid_utf8(b"plain"), "plain");
        assert_eq!(strip_invalid_utf8(b"a\xffb\xfe\xfdc"), "abc");
        assert_eq!(strip_invalid_utf8("é".as_bytes()), "é");
        assert_eq!(strip_invalid_utf8(b"ok\xe2\x82"), "ok");
    }
}
