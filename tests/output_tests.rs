use blkio_latency::correlator::{correlate_stream, Correlator, RunSummary, StreamOptions};
use blkio_latency::output::{open_output, read_report, validate_path, CsvSink, JsonSink, ResultSink};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::NamedTempFile;

const TRACE: &str = "\
  8,0    3        1     0.000000000  4162  Q  WS 1953520 + 8 [kworker]
  8,0    3        2     0.000012345  4162  D  WS 1953520 + 8 [kworker]
  8,0    3        3     0.000020000  4170  D   R 2048 + 256 [fio]
  8,0    3        4     0.000312345     0  C  WS 1953520 + 8 [0]
  8,0    3        5     0.001020000     0  C   R 2048 + 256 [0]
CPU3 (sda):
 Reads Queued:           0,        0KiB\t Writes Queued:           1,        4KiB
";

#[test]
fn test_csv_matches_legacy_layout() {
    let mut correlator = Correlator::new();
    let mut sink = CsvSink::new(Vec::new());
    correlate_stream(
        Cursor::new(TRACE),
        &mut correlator,
        &mut sink,
        &StreamOptions::default(),
    )
    .unwrap();

    let csv = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        csv,
        "number,opcode,tag,lba,xfrlen,Completion time,response\r\n\
         0,0x8A,WS_1953520_8,0x1dcef0,0x8,12,300\r\n\
         1,0x88,R_2048_256,0x800,0x100,20,1000\r\n"
    );
}

#[test]
fn test_json_report_round_trip_through_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let writer = open_output(Some(temp_file.path())).unwrap();

    let mut correlator = Correlator::new();
    let mut sink = JsonSink::new(writer, "trace.txt");
    let summary = correlate_stream(
        Cursor::new(TRACE),
        &mut correlator,
        &mut sink,
        &StreamOptions::default(),
    )
    .unwrap();
    drop(sink);

    let report = read_report(temp_file.path()).unwrap();
    assert_eq!(report.source, "trace.txt");
    assert_eq!(report.summary, summary);
    assert_eq!(report.completions.len(), 2);
    assert_eq!(report.completions[1].lba_hex, "0x800");
    assert!(report.summary.stopped_at_summary);
}

#[test]
fn test_csv_sink_through_trait_object() {
    let mut sink: Box<dyn ResultSink> = Box::new(CsvSink::new(Vec::new()));
    sink.finish(&RunSummary::default()).unwrap();
}

#[test]
fn test_validate_output_path_empty() {
    assert!(validate_path(Path::new("")).is_err());
}

#[test]
fn test_validate_output_path_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    assert!(validate_path(temp_dir.path()).is_err());
}

#[test]
fn test_open_output_creates_parent_dirs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let nested_path = temp_dir.path().join("nested/dirs/latency.csv");

    let writer = open_output(Some(&nested_path)).unwrap();
    let mut sink = CsvSink::new(writer);
    sink.finish(&RunSummary::default()).unwrap();
    drop(sink);

    assert_eq!(
        fs::read_to_string(&nested_path).unwrap(),
        "number,opcode,tag,lba,xfrlen,Completion time,response\r\n"
    );
}
