//! Dispatch/completion correlation state machine.
//!
//! Every `D` record becomes an outstanding entry in the [`PendingIndex`];
//! every `C` record looks for an outstanding entry with the same
//! (class, lba, length) in any pid and, if one is found, produces a
//! [`CompletionRecord`]. There is no other lifecycle: an entry is either
//! outstanding or matched.

use super::completion::{build_tag, to_hex, CompletionRecord};
use super::pending::{EvictionPolicy, PendingIndex, PendingKey};
use crate::parser::{EventType, TraceRecord};
use crate::utils::config::{COL_LBA, COL_LENGTH};
use crate::utils::error::ParseError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Correlator configuration
#[derive(Debug, Clone, Default)]
pub struct CorrelatorConfig {
    pub eviction: EvictionPolicy,
}

impl CorrelatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.eviction.ttl = Some(ttl);
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.eviction.max_pending = Some(max_pending);
        self
    }
}

/// Per-run counters kept by the correlator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationStats {
    /// Records handed to [`Correlator::process`]
    pub records: u64,
    /// Neither dispatch nor completion
    pub ignored: u64,
    /// D/C records whose opcode is neither read nor write
    pub unclassified: u64,
    pub dispatches: u64,
    pub completions: u64,
    pub matched: u64,
    /// Completions with no outstanding dispatch
    pub unmatched: u64,
    /// Completions whose lba/length are not integers
    pub malformed_completions: u64,
    pub evicted: u64,
    /// Dispatches still outstanding when the stats were taken
    pub outstanding: u64,
}

/// Owns the pending index and the output sequence counter
#[derive(Debug, Default)]
pub struct Correlator {
    index: PendingIndex,
    next_sequence: u64,
    stats: CorrelationStats,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CorrelatorConfig) -> Self {
        Self {
            index: PendingIndex::with_policy(config.eviction),
            ..Self::default()
        }
    }

    /// Feed one record, in arrival order
    ///
    /// Returns the completion record when `record` completes an outstanding
    /// dispatch.
    ///
    /// # Errors
    /// * `ParseError::BadField` - a completion's lba or length is not an
    ///   unsigned integer. The index is left untouched.
    pub fn process(
        &mut self,
        record: &TraceRecord,
    ) -> Result<Option<CompletionRecord>, ParseError> {
        self.stats.records += 1;
        self.index.expire(record.timestamp_micros);

        if matches!(record.event_type, EventType::Other(_)) {
            self.stats.ignored += 1;
            return Ok(None);
        }

        let Some(class) = record.opcode_class() else {
            debug!(
                "Ignoring {} with unclassified opcode {:?}",
                record.event_type.code(),
                record.opcode_raw
            );
            self.stats.unclassified += 1;
            return Ok(None);
        };

        let key = PendingKey::new(class, record.lba.as_str(), record.length.as_str());

        match record.event_type {
            EventType::Dispatch => {
                self.stats.dispatches += 1;
                self.index.insert(record.pid, key, record.timestamp_micros);
                Ok(None)
            }
            EventType::Complete => {
                self.stats.completions += 1;
                self.complete(record, key).map_err(|e| {
                    self.stats.malformed_completions += 1;
                    e
                })
            }
            EventType::Other(_) => Ok(None),
        }
    }

    fn complete(
        &mut self,
        record: &TraceRecord,
        key: PendingKey,
    ) -> Result<Option<CompletionRecord>, ParseError> {
        let lba = parse_block_field(&record.lba, COL_LBA)?;
        let length = parse_block_field(&record.length, COL_LENGTH)?;

        let Some((dispatch_pid, dispatched_at)) = self.index.take_first_match(&key) else {
            self.stats.unmatched += 1;
            return Ok(None);
        };

        if dispatch_pid != record.pid {
            debug!(
                "Completion from pid {} matched dispatch from pid {}",
                record.pid, dispatch_pid
            );
        }

        let duration_micros = duration_between(dispatched_at, record.timestamp_micros);

        let sequence_number = self.next_sequence;
        self.next_sequence += 1;
        self.stats.matched += 1;

        Ok(Some(CompletionRecord {
            sequence_number,
            opcode_class: key.class,
            tag: build_tag(&record.opcode_raw, &record.lba, &record.length),
            lba_hex: to_hex(lba),
            length_hex: to_hex(length),
            dispatch_timestamp_micros: dispatched_at,
            duration_micros,
        }))
    }

    /// Snapshot of the counters, including current eviction/outstanding totals
    pub fn stats(&self) -> CorrelationStats {
        CorrelationStats {
            evicted: self.index.evicted(),
            outstanding: self.index.len() as u64,
            ..self.stats.clone()
        }
    }

    pub fn pending(&self) -> &PendingIndex {
        &self.index
    }

    /// Number of completion records emitted so far
    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }
}

/// Completion minus dispatch, clamped to the `i64` range
fn duration_between(dispatched_at: i64, completed_at: i64) -> i64 {
    completed_at.checked_sub(dispatched_at).unwrap_or_else(|| {
        warn!(
            "Duration between dispatch at {}us and completion at {}us overflows, clamping",
            dispatched_at, completed_at
        );
        if completed_at > dispatched_at {
            i64::MAX
        } else {
            i64::MIN
        }
    })
}

fn parse_block_field(value: &str, column: usize) -> Result<u64, ParseError> {
    value.parse::<u64>().map_err(|_| ParseError::BadField {
        column,
        value: value.to_string(),
    })
}
