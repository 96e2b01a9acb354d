//! blkio-latency
//!
//! Per-request block I/O latency reconstruction from `blkparse` traces.
//!
//! Every dispatch (`D`) event is held until a completion (`C`) event with
//! the same read/write class, LBA and transfer length arrives; the pair
//! becomes a [`correlator::CompletionRecord`] carrying the dispatch time and
//! the latency in microseconds.
//!
//! ## Getting Started
//!
//! ```bash
//! blktrace -d /dev/sda -o - | blkparse -i - > trace.txt
//! blkio-latency correlate trace.txt -o latency.csv
//! ```
//!
//! As a library:
//!
//! ```no_run
//! use blkio_latency::correlator::{correlate_stream, Correlator, StreamOptions};
//! use blkio_latency::output::CsvSink;
//! use std::io::{BufReader, stdout};
//!
//! let trace = std::fs::File::open("trace.txt")?;
//! let mut correlator = Correlator::new();
//! let mut sink = CsvSink::new(stdout());
//! correlate_stream(BufReader::new(trace), &mut correlator, &mut sink, &StreamOptions::default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod commands;
pub mod correlator;
pub mod output;
pub mod parser;
pub mod utils;
