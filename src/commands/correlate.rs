//! Correlate command implementation.
//!
//! The correlate command:
//! 1. Opens the trace (file or stdin)
//! 2. Parses and correlates every event line
//! 3. Writes completion records as CSV or JSON
//! 4. Reports run diagnostics

use crate::correlator::{correlate_stream, Correlator, CorrelatorConfig, RunSummary, StreamOptions};
use crate::output::{open_output, CsvSink, JsonSink, OutputFormat, ResultSink};
use crate::utils::config::{DEFAULT_CHANNEL_CAPACITY, MAX_CHANNEL_CAPACITY};
use crate::utils::error::CorrelateError;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Arguments for the correlate command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct CorrelateArgs {
    /// Trace file; `-` reads stdin
    pub input: PathBuf,

    /// Output file; `None` or `-` writes stdout
    pub output: Option<PathBuf>,

    pub format: OutputFormat,

    /// Maximum number of outstanding dispatches
    pub max_pending: Option<usize>,

    /// Drop dispatches older than this many milliseconds of trace time
    pub pending_ttl_ms: Option<u64>,

    /// Stop after this many input lines
    pub limit: Option<usize>,

    /// Read the trace on a separate thread
    pub threaded: bool,

    pub channel_capacity: usize,

    /// Print run diagnostics to stderr
    pub print_summary: bool,
}

impl Default for CorrelateArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("-"),
            output: None,
            format: OutputFormat::Csv,
            max_pending: None,
            pending_ttl_ms: None,
            limit: None,
            threaded: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            print_summary: false,
        }
    }
}

impl CorrelateArgs {
    pub fn correlator_config(&self) -> CorrelatorConfig {
        let mut config = CorrelatorConfig::new();
        if let Some(ttl) = self.pending_ttl_ms {
            config = config.with_pending_ttl(Duration::from_millis(ttl));
        }
        if let Some(max) = self.max_pending {
            config = config.with_max_pending(max);
        }
        config
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            limit: self.limit,
            threaded: self.threaded,
            channel_capacity: self.channel_capacity,
        }
    }

    fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}

/// Execute the correlate command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Input file cannot be opened
/// * Read failure mid-stream
/// * Output cannot be created or written
pub fn execute_correlate(args: CorrelateArgs) -> Result<RunSummary> {
    let start_time = Instant::now();

    info!("Correlating trace: {}", describe_input(&args));

    // Step 1: Open input
    info!("Step 1/3: Opening input...");
    let reader = open_input(&args)?;

    // Step 2: Prepare sink
    info!("Step 2/3: Preparing {:?} output...", args.format);
    let writer = open_output(args.output.as_deref()).context("Failed to open output")?;
    let mut sink: Box<dyn ResultSink> = match args.format {
        OutputFormat::Csv => Box::new(CsvSink::new(writer)),
        OutputFormat::Json => Box::new(JsonSink::new(writer, describe_input(&args))),
    };

    // Step 3: Correlate
    info!("Step 3/3: Correlating events...");
    let mut correlator = Correlator::with_config(args.correlator_config());
    let summary = correlate_stream(reader, &mut correlator, &mut sink, &args.stream_options())
        .context("Correlation failed")?;

    debug!("Run summary: {:?}", summary);

    if let Some(path) = &args.output {
        info!("✓ Results written to: {}", path.display());
    }

    if args.print_summary {
        print_summary(&summary).context("Failed to print summary")?;
    }

    let elapsed = start_time.elapsed();
    info!("Correlation completed in {:.2}s", elapsed.as_secs_f64());

    Ok(summary)
}

/// Open the trace for reading
///
/// **Private** - internal helper for execute_correlate
fn open_input(args: &CorrelateArgs) -> Result<Box<dyn BufRead + Send>> {
    if args.reads_stdin() {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(&args.input)
        .map_err(CorrelateError::InputUnavailable)
        .with_context(|| format!("Cannot open trace {}", args.input.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn describe_input(args: &CorrelateArgs) -> String {
    if args.reads_stdin() {
        "<stdin>".to_string()
    } else {
        args.input.display().to_string()
    }
}

/// Diagnostics go to stderr so stdout stays clean for piped results
fn print_summary(summary: &RunSummary) -> io::Result<()> {
    let stats = &summary.correlation;
    let mut err = io::stderr().lock();

    writeln!(err, "{}", "=".repeat(60))?;
    writeln!(err, "CORRELATION SUMMARY")?;
    writeln!(err, "{}", "=".repeat(60))?;
    writeln!(err, "Lines read:            {}", summary.lines_read)?;
    writeln!(err, "Malformed lines:       {}", summary.malformed_lines)?;
    writeln!(err, "Ignored events:        {}", stats.ignored)?;
    writeln!(err, "Unclassified opcodes:  {}", stats.unclassified)?;
    writeln!(err, "Dispatches:            {}", stats.dispatches)?;
    writeln!(err, "Completions:           {}", stats.completions)?;
    writeln!(err, "Matched:               {}", stats.matched)?;
    writeln!(err, "Unmatched completions: {}", stats.unmatched)?;
    writeln!(err, "Evicted dispatches:    {}", stats.evicted)?;
    writeln!(err, "Still outstanding:     {}", stats.outstanding)?;
    if summary.stopped_at_summary {
        writeln!(err, "Stopped at blkparse summary section")?;
    }
    if summary.limit_reached {
        writeln!(err, "Stopped at line limit")?;
    }
    writeln!(err, "{}", "=".repeat(60))?;
    Ok(())
}

/// Validate correlate arguments
///
/// **Public** - can be called before execute_correlate for early validation
pub fn validate_args(args: &CorrelateArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.reads_stdin() && !args.input.is_file() {
        anyhow::bail!("Input trace not found: {}", args.input.display());
    }

    if let Some(output) = &args.output {
        if output.as_os_str().is_empty() {
            anyhow::bail!("Output path cannot be empty");
        }
        if output == &args.input && !args.reads_stdin() {
            anyhow::bail!("Output path must differ from the input trace");
        }
    }

    if args.max_pending == Some(0) {
        anyhow::bail!("max_pending must be greater than 0");
    }

    if args.pending_ttl_ms == Some(0) {
        anyhow::bail!("pending_ttl_ms must be greater than 0");
    }

    if args.channel_capacity == 0 {
        anyhow::bail!("channel_capacity must be greater than 0");
    }

    if args.channel_capacity > MAX_CHANNEL_CAPACITY {
        anyhow::bail!("channel_capacity is too large (max {})", MAX_CHANNEL_CAPACITY);
    }

    Ok(())
}
