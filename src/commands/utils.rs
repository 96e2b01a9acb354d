use crate::output::read_report;
use crate::utils::config::{CSV_HEADER, SCHEMA_VERSION};
use anyhow::Result;
use std::path::PathBuf;

/// Validate a JSON latency report
pub fn validate_report_file(file_path: PathBuf) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Source: {}", report.source);
    println!("  Lines Read: {}", report.summary.lines_read);
    println!("  Completions: {}", report.completions.len());

    if report.completions.len() as u64 != report.summary.matched() {
        anyhow::bail!(
            "Report lists {} completions but summary counts {} matches",
            report.completions.len(),
            report.summary.matched()
        );
    }

    let out_of_order = report
        .completions
        .iter()
        .enumerate()
        .any(|(i, c)| c.sequence_number != i as u64);
    if out_of_order {
        anyhow::bail!("Completion sequence numbers are not 0..n in order");
    }

    Ok(())
}

/// Display output schema information
pub fn display_schema(show_details: bool) {
    println!("blkio-latency Output Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!("CSV Columns: {}", CSV_HEADER.join(","));
    println!();

    if show_details {
        println!("CSV Columns:");
        println!("  number          - Sequence number of the completion (from 0)");
        println!("  opcode          - 0x88 for reads, 0x8A for writes");
        println!("  tag             - <raw opcode>_<lba>_<length>");
        println!("  lba             - Logical block address (hex)");
        println!("  xfrlen          - Transfer length in blocks (hex)");
        println!("  Completion time - Dispatch timestamp (microseconds)");
        println!("  response        - Dispatch-to-completion latency (microseconds)");
        println!();
        println!("JSON Report:");
        println!("  version: string       - Schema version");
        println!("  source: string        - Input trace");
        println!("  generated_at: string  - ISO 8601 timestamp");
        println!("  summary: object       - Run diagnostics");
        println!("  completions: array    - One object per matched request");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("blkio-latency v{}", env!("CARGO_PKG_VERSION"));
    println!("Output Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Per-request block I/O latency from blkparse traces.");
}
