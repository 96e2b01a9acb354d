//! Dispatch/completion correlation.
//!
//! This module turns a stream of parsed trace records into:
//! - Outstanding dispatches (the pending index)
//! - Completion records with per-request latency
//! - Run diagnostics

pub mod completion;
pub mod engine;
pub mod pending;
pub mod stream;

// Re-export main types and functions
pub use completion::CompletionRecord;
pub use engine::{CorrelationStats, Correlator, CorrelatorConfig};
pub use pending::{EvictionPolicy, PendingIndex, PendingKey};
pub use stream::{correlate_stream, RunSummary, StreamOptions};
