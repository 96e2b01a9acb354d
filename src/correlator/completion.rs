//! Output record for one matched dispatch/completion pair.

use crate::parser::OpcodeClass;
use serde::{Deserialize, Serialize};

/// A completed I/O with its reconstructed latency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Emission order, starting at 0
    pub sequence_number: u64,

    pub opcode_class: OpcodeClass,

    /// `{raw opcode}_{lba}_{length}` built from the completion event
    pub tag: String,

    /// `0x`-prefixed lowercase hex
    pub lba_hex: String,
    pub length_hex: String,

    pub dispatch_timestamp_micros: i64,

    /// Completion minus dispatch. Negative values are reported as-is.
    pub duration_micros: i64,
}

impl CompletionRecord {
    pub fn opcode_hex(&self) -> &'static str {
        self.opcode_class.hex_code()
    }
}

pub(crate) fn build_tag(opcode_raw: &str, lba: &str, length: &str) -> String {
    format!("{}_{}_{}", opcode_raw, lba, length)
}

pub(crate) fn to_hex(value: u64) -> String {
    format!("{:#x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_rendering() {
        assert_eq!(to_hex(1000), "0x3e8");
        assert_eq!(to_hex(16), "0x10");
        assert_eq!(to_hex(0), "0x0");
    }

    #[test]
    fn test_tag_keeps_raw_opcode() {
        assert_eq!(build_tag("WS", "2048", "8"), "WS_2048_8");
    }
}
