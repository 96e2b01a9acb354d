//! Configuration and constants for the CLI.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

// Column positions in blkparse's default output:
// `maj,min cpu seq time pid action rwbs sector + blocks [process]`
pub const COL_DEVICE: usize = 0;
pub const COL_TIMESTAMP: usize = 3;
pub const COL_PID: usize = 4;
pub const COL_EVENT_TYPE: usize = 5;
pub const COL_OPCODE: usize = 6;
pub const COL_LBA: usize = 7;
pub const COL_LENGTH: usize = 9;

/// Minimum number of tokens needed to address every required column
pub const MIN_FIELDS: usize = 10;

/// Phrases that open blkparse's trailing report section
pub const SUMMARY_MARKERS: &[&str] = &["Reads Queued", "Throughput", "Events"];

pub const MICROS_PER_SECOND: i64 = 1_000_000;

// Legacy opcode codes written to the CSV `opcode` column
pub const WRITE_OPCODE_HEX: &str = "0x8A";
pub const READ_OPCODE_HEX: &str = "0x88";

pub const CSV_HEADER: &[&str] = &[
    "number",
    "opcode",
    "tag",
    "lba",
    "xfrlen",
    "Completion time",
    "response",
];

/// Default depth of the reader -> correlator channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;
pub const MAX_CHANNEL_CAPACITY: usize = 1 << 20;
