use blkio_latency::commands::{execute_correlate, validate_args, validate_report_file, CorrelateArgs};
use blkio_latency::output::{read_report, OutputFormat};
use std::fs;
use std::path::PathBuf;

const TRACE: &str = "\
  8,0    0        1   100.000000000    42  D   R 1000 + 16 [fio]
  8,0    0        2   100.000100000    42  D   W 5000 + 8 [fio]
  8,0    0        3   100.000500000    99  C   R 1000 + 16 [0]
  8,0    0        4   100.000900000    99  C   W 5000 + 8 [0]
Total (sda):
 Reads Queued:           1,        8KiB\t Writes Queued:           1,        4KiB
";

fn write_trace(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("trace.txt");
    fs::write(&path, TRACE).unwrap();
    path
}

#[test]
fn test_validate_args_existing_input() {
    let dir = tempfile::tempdir().unwrap();
    let args = CorrelateArgs {
        input: write_trace(&dir),
        ..Default::default()
    };

    assert!(validate_args(&args).is_ok());
}

#[test]
fn test_validate_args_output_same_as_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_trace(&dir);
    let args = CorrelateArgs {
        output: Some(input.clone()),
        input,
        ..Default::default()
    };

    assert!(validate_args(&args).is_err());
}

#[test]
fn test_execute_correlate_csv() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out/latency.csv");
    let args = CorrelateArgs {
        input: write_trace(&dir),
        output: Some(output.clone()),
        ..Default::default()
    };

    let summary = execute_correlate(args).unwrap();
    assert_eq!(summary.matched(), 2);
    assert!(summary.stopped_at_summary);

    let csv = fs::read_to_string(&output).unwrap();
    let rows: Vec<&str> = csv.split("\r\n").filter(|r| !r.is_empty()).collect();
    assert_eq!(
        rows,
        vec![
            "number,opcode,tag,lba,xfrlen,Completion time,response",
            "0,0x88,R_1000_16,0x3e8,0x10,100000000,500",
            "1,0x8A,W_5000_8,0x1388,0x8,100000100,800",
        ]
    );
}

#[test]
fn test_execute_correlate_json_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("latency.json");
    let args = CorrelateArgs {
        input: write_trace(&dir),
        output: Some(output.clone()),
        format: OutputFormat::Json,
        threaded: true,
        channel_capacity: 2,
        ..Default::default()
    };

    execute_correlate(args).unwrap();

    let report = read_report(&output).unwrap();
    assert_eq!(report.completions.len(), 2);
    assert_eq!(report.summary.correlation.dispatches, 2);
    assert!(validate_report_file(output).is_ok());
}

#[test]
fn test_execute_correlate_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let args = CorrelateArgs {
        input: dir.path().join("missing.txt"),
        output: Some(dir.path().join("out.csv")),
        ..Default::default()
    };

    let err = execute_correlate(args).unwrap_err();
    assert!(format!("{:#}", err).contains("Input unavailable"));
}

#[test]
fn test_validate_report_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("latency.json");
    let args = CorrelateArgs {
        input: write_trace(&dir),
        output: Some(output.clone()),
        format: OutputFormat::Json,
        ..Default::default()
    };
    execute_correlate(args).unwrap();

    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    value["completions"].as_array_mut().unwrap().pop();
    fs::write(&output, serde_json::to_string(&value).unwrap()).unwrap();

    assert!(validate_report_file(output).is_err());
}
