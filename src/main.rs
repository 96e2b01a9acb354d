//! blkio-latency CLI
//!
//! Reconstructs per-request block I/O latency from blkparse output by
//! pairing dispatch and completion events.

use anyhow::Result;
use blkio_latency::commands::{
    display_schema, display_version, execute_correlate, validate_args, validate_report_file,
    CorrelateArgs,
};
use blkio_latency::output::OutputFormat;
use blkio_latency::utils::config::DEFAULT_CHANNEL_CAPACITY;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// blkio-latency - block I/O latency from blkparse traces
#[derive(Parser, Debug)]
#[command(name = "blkio-latency")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Pair dispatch and completion events and report per-request latency
    Correlate {
        /// blkparse text output ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Maximum number of outstanding dispatches; the oldest is evicted first
        #[arg(long, env = "BLKIO_LATENCY_MAX_PENDING")]
        max_pending: Option<usize>,

        /// Drop dispatches still outstanding after this many milliseconds of trace time
        #[arg(long, env = "BLKIO_LATENCY_PENDING_TTL_MS")]
        pending_ttl_ms: Option<u64>,

        /// Stop after this many input lines
        #[arg(long)]
        limit: Option<usize>,

        /// Read the trace on a separate thread
        #[arg(long)]
        threaded: bool,

        /// Reader channel depth when --threaded
        #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
        channel_capacity: usize,

        /// Print run diagnostics to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Validate a JSON latency report
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display output schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Correlate {
            input,
            output,
            format,
            max_pending,
            pending_ttl_ms,
            limit,
            threaded,
            channel_capacity,
            summary,
        } => {
            let args = CorrelateArgs {
                input,
                output,
                format,
                max_pending,
                pending_ttl_ms,
                limit,
                threaded,
                channel_capacity,
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            execute_correlate(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
