//! Line parser for blkparse text output.
//!
//! Columns are addressed by position, not by label. A line that lacks a
//! required column, or whose timestamp/pid does not parse, is rejected with
//! a [`ParseError`]; the caller decides how to report it.

use super::record::{EventType, TraceRecord};
use crate::utils::config::{
    COL_DEVICE, COL_EVENT_TYPE, COL_LBA, COL_LENGTH, COL_OPCODE, COL_PID, COL_TIMESTAMP,
    MICROS_PER_SECOND, MIN_FIELDS, SUMMARY_MARKERS,
};
use crate::utils::error::ParseError;

/// Parse one line of blkparse output
///
/// **Public** - main entry point for parsing
///
/// # Errors
/// * `ParseError::TooFewFields` - fewer than [`MIN_FIELDS`] tokens
/// * `ParseError::BadField` - timestamp or pid column does not parse
pub fn parse_line(line: &str) -> Result<TraceRecord, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            expected: MIN_FIELDS,
            found: parts.len(),
        });
    }

    let timestamp_micros = parse_timestamp_micros(parts[COL_TIMESTAMP])
        .ok_or_else(|| bad_field(COL_TIMESTAMP, parts[COL_TIMESTAMP]))?;

    let pid = parts[COL_PID]
        .parse::<i64>()
        .map_err(|_| bad_field(COL_PID, parts[COL_PID]))?;

    Ok(TraceRecord {
        device: parts[COL_DEVICE].to_string(),
        timestamp_micros,
        pid,
        event_type: EventType::from_code(parts[COL_EVENT_TYPE]),
        opcode_raw: parts[COL_OPCODE].to_string(),
        lba: parts[COL_LBA].to_string(),
        length: parts[COL_LENGTH].to_string(),
    })
}

/// Whether the line belongs to blkparse's trailing report section
pub fn is_summary_marker(line: &str) -> bool {
    SUMMARY_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Convert a seconds value to integer microseconds, truncating
///
/// Plain decimal tokens (`123.456789012`) are converted digit by digit so no
/// floating-point error leaks into durations. Anything else that still
/// parses as a finite float (exponent notation) goes through `f64`.
pub fn parse_timestamp_micros(token: &str) -> Option<i64> {
    let seconds = token.parse::<f64>().ok()?;
    if !seconds.is_finite() {
        return None;
    }

    exact_decimal_micros(token).or_else(|| {
        let micros = (seconds * MICROS_PER_SECOND as f64).trunc();
        if micros.abs() < i64::MAX as f64 {
            Some(micros as i64)
        } else {
            None
        }
    })
}

/// Exact conversion for `[+-]digits[.digits]`; `None` if the token has any
/// other shape or overflows
fn exact_decimal_micros(token: &str) -> Option<i64> {
    let (negative, unsigned) = match token.as_bytes().first().copied()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    // First six fractional digits, right-padded with zeros
    let mut frac_value: i64 = 0;
    let mut digits = frac.bytes();
    for _ in 0..6 {
        let digit = digits.next().map_or(0, |b| i64::from(b - b'0'));
        frac_value = frac_value * 10 + digit;
    }

    let micros = whole_value
        .checked_mul(MICROS_PER_SECOND)?
        .checked_add(frac_value)?;

    Some(if negative { -micros } else { micros })
}

fn bad_field(column: usize, value: &str) -> ParseError {
    ParseError::BadField {
        column,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::record::OpcodeClass;

    const DISPATCH: &str = "8,0    3        1   100.000000000    42  D   R 1000 + 16 [fio]";

    #[test]
    fn test_parse_dispatch_line() {
        let record = parse_line(DISPATCH).unwrap();
        assert_eq!(record.device, "8,0");
        assert_eq!(record.timestamp_micros, 100_000_000);
        assert_eq!(record.pid, 42);
        assert_eq!(record.event_type, EventType::Dispatch);
        assert_eq!(record.opcode_raw, "R");
        assert_eq!(record.opcode_class(), Some(OpcodeClass::Read));
        assert_eq!(record.lba, "1000");
        assert_eq!(record.length, "16");
    }

    #[test]
    fn test_too_few_fields() {
        assert_eq!(
            parse_line("8,0 3 1 0.5 42"),
            Err(ParseError::TooFewFields {
                expected: 10,
                found: 5
            })
        );
        assert!(matches!(parse_line(""), Err(ParseError::TooFewFields { found: 0, .. })));
    }

    #[test]
    fn test_bad_timestamp() {
        let err = parse_line("8,0 3 1 abc 42 D R 1000 + 16").unwrap_err();
        assert_eq!(
            err,
            ParseError::BadField {
                column: 3,
                value: "abc".to_string()
            }
        );
        assert!(parse_line("8,0 3 1 NaN 42 D R 1000 + 16").is_err());
        assert!(parse_line("8,0 3 1 inf 42 D R 1000 + 16").is_err());
    }

    #[test]
    fn test_bad_pid() {
        let err = parse_line("8,0 3 1 1.0 4x2 D R 1000 + 16").unwrap_err();
        assert!(matches!(err, ParseError::BadField { column: 4, .. }));
    }

    #[test]
    fn test_non_numeric_lba_still_parses() {
        let record = parse_line("8,0 3 1 1.0 42 D R abc + 16").unwrap();
        assert_eq!(record.lba, "abc");
    }

    #[test]
    fn test_other_event_types_parse() {
        let record = parse_line("8,0 3 1 1.0 42 Q R 1000 + 16 [fio]").unwrap();
        assert_eq!(record.event_type, EventType::Other("Q".to_string()));
    }

    #[test]
    fn test_timestamp_truncates() {
        assert_eq!(parse_timestamp_micros("100.000500"), Some(100_000_500));
        assert_eq!(parse_timestamp_micros("0.0000019"), Some(1));
        assert_eq!(parse_timestamp_micros("2"), Some(2_000_000));
        assert_eq!(parse_timestamp_micros(".5"), Some(500_000));
        assert_eq!(parse_timestamp_micros("-1.5"), Some(-1_500_000));
        assert_eq!(parse_timestamp_micros("1e-3"), Some(1_000));
        assert_eq!(parse_timestamp_micros("."), None);
        assert_eq!(parse_timestamp_micros("x"), None);
    }

    #[test]
    fn test_summary_markers() {
        assert!(is_summary_marker("Throughput (R/W): 0KiB/s / 0KiB/s"));
        assert!(is_summary_marker(" Reads Queued:           0,        0KiB"));
        assert!(is_summary_marker("Events (sda): 1234 entries"));
        assert!(!is_summary_marker(DISPATCH));
    }
}
