//! Typed trace records produced by the line parser.

use crate::utils::config::{READ_OPCODE_HEX, WRITE_OPCODE_HEX};
use serde::{Deserialize, Serialize};
use std::fmt;

/// blkparse action code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    /// `D` - request issued to the device driver
    Dispatch,
    /// `C` - request completed by the device
    Complete,
    /// Any other action (Q, G, I, M, P, U, ...). Carried but never correlated.
    Other(String),
}

impl EventType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "D" => EventType::Dispatch,
            "C" => EventType::Complete,
            other => EventType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            EventType::Dispatch => "D",
            EventType::Complete => "C",
            EventType::Other(code) => code,
        }
    }
}

/// Read/write classification of a raw RWBS token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpcodeClass {
    Read,
    Write,
}

impl OpcodeClass {
    /// Classify a raw opcode token.
    ///
    /// The write marker is checked first, so a token carrying both `W` and
    /// `R` is a write. Tokens with neither (discards, flushes) are `None`.
    pub fn classify(raw: &str) -> Option<Self> {
        if raw.contains('W') {
            Some(OpcodeClass::Write)
        } else if raw.contains('R') {
            Some(OpcodeClass::Read)
        } else {
            None
        }
    }

    /// Fixed hex code written to the legacy CSV `opcode` column
    pub fn hex_code(self) -> &'static str {
        match self {
            OpcodeClass::Write => WRITE_OPCODE_HEX,
            OpcodeClass::Read => READ_OPCODE_HEX,
        }
    }
}

impl fmt::Display for OpcodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpcodeClass::Read => write!(f, "read"),
            OpcodeClass::Write => write!(f, "write"),
        }
    }
}

/// One parsed line of blkparse output
///
/// Only constructed when every required column parsed. `lba` and `length`
/// stay as their original decimal strings; they are integer-validated when
/// a completion is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    /// Device id column (`maj,min`), unused by the correlator
    pub device: String,
    pub timestamp_micros: i64,
    pub pid: i64,
    pub event_type: EventType,
    pub opcode_raw: String,
    pub lba: String,
    pub length: String,
}

impl TraceRecord {
    pub fn opcode_class(&self) -> Option<OpcodeClass> {
        OpcodeClass::classify(&self.opcode_raw)
    }
}
