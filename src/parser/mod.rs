//! Trace line parsing and record types.
//!
//! This module handles:
//! - Splitting blkparse lines into typed records
//! - Detecting the trailing summary section
//! - Read/write classification of opcodes

pub mod blkparse;
pub mod record;

// Re-export main types
pub use blkparse::{is_summary_marker, parse_line, parse_timestamp_micros};
pub use record::{EventType, OpcodeClass, TraceRecord};
