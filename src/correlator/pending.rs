//! Index of dispatches still waiting for their completion.
//!
//! Layout is pid -> (key -> dispatch timestamp). Pids are kept in the order
//! they were first seen, and a completion is matched against the first pid
//! (in that order) holding an equal key. Completions don't carry the
//! dispatching pid, hence the cross-pid scan; cost per lookup is linear in
//! the number of pids ever seen.

use crate::parser::OpcodeClass;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;

/// Identity of an outstanding operation within one pid
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingKey {
    pub class: OpcodeClass,
    pub lba: String,
    pub length: String,
}

impl PendingKey {
    pub fn new(class: OpcodeClass, lba: impl Into<String>, length: impl Into<String>) -> Self {
        Self {
            class,
            lba: lba.into(),
            length: length.into(),
        }
    }
}

/// Bounds on how long, and how many, dispatches may stay outstanding
///
/// Both limits are off by default, which keeps every dispatch until the end
/// of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Drop dispatches older than this, measured in trace time
    pub ttl: Option<Duration>,
    /// Maximum number of outstanding dispatches across all pids
    pub max_pending: Option<usize>,
}

impl EvictionPolicy {
    fn ttl_micros(&self) -> Option<i64> {
        self.ttl
            .map(|ttl| i64::try_from(ttl.as_micros()).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Default)]
struct PidEntries {
    pid: i64,
    pending: HashMap<PendingKey, i64>,
}

/// Map-of-maps holding outstanding dispatches
#[derive(Debug, Default)]
pub struct PendingIndex {
    /// In first-seen order. Never shrinks, so order survives a pid draining.
    pids: Vec<PidEntries>,
    slots: HashMap<i64, usize>,
    len: usize,
    policy: EvictionPolicy,
    /// Dispatches strictly older than this are expired
    cutoff: Option<i64>,
    last_sweep: Option<i64>,
    evicted: u64,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Record a dispatch. An identical key already pending for `pid` is
    /// overwritten; its old timestamp is returned.
    pub fn insert(&mut self, pid: i64, key: PendingKey, timestamp: i64) -> Option<i64> {
        let slot = match self.slots.get(&pid) {
            Some(&slot) => slot,
            None => {
                self.pids.push(PidEntries {
                    pid,
                    pending: HashMap::new(),
                });
                let slot = self.pids.len() - 1;
                self.slots.insert(pid, slot);
                slot
            }
        };

        if let Some(previous) = self.pids[slot].pending.get_mut(&key) {
            return Some(std::mem::replace(previous, timestamp));
        }

        if let Some(max) = self.policy.max_pending {
            while self.len >= max.max(1) {
                if self.evict_oldest().is_none() {
                    break;
                }
            }
        }

        self.pids[slot].pending.insert(key, timestamp);
        self.len += 1;
        None
    }

    /// Remove and return the first pending dispatch equal to `key`,
    /// scanning pids in first-seen order
    ///
    /// Expired entries met during the scan are dropped and skipped.
    pub fn take_first_match(&mut self, key: &PendingKey) -> Option<(i64, i64)> {
        for entries in &mut self.pids {
            let Some(timestamp) = entries.pending.remove(key) else {
                continue;
            };
            self.len -= 1;

            if self.cutoff.is_some_and(|cutoff| timestamp < cutoff) {
                debug!(
                    "Dropping expired dispatch pid={} {:?} at {}",
                    entries.pid, key, timestamp
                );
                self.evicted += 1;
                continue;
            }

            return Some((entries.pid, timestamp));
        }
        None
    }

    /// Advance trace time to `now` and apply the TTL
    ///
    /// The match path honours the TTL exactly; the full sweep that reclaims
    /// memory runs at most once per quarter TTL of trace time.
    pub fn expire(&mut self, now: i64) {
        let Some(ttl) = self.policy.ttl_micros() else {
            return;
        };
        let cutoff = now.saturating_sub(ttl);
        self.cutoff = Some(self.cutoff.map_or(cutoff, |c| c.max(cutoff)));

        let interval = (ttl / 4).max(1);
        if self
            .last_sweep
            .is_some_and(|last| now.saturating_sub(last) < interval)
        {
            return;
        }
        self.last_sweep = Some(now);

        let removed = self.evict_older_than(cutoff);
        if removed > 0 {
            debug!("Expired {} pending dispatches older than {}", removed, cutoff);
        }
    }

    /// Remove every dispatch with a timestamp strictly below `cutoff`
    pub fn evict_older_than(&mut self, cutoff: i64) -> usize {
        let mut removed = 0;
        for entries in &mut self.pids {
            let before = entries.pending.len();
            entries.pending.retain(|_, timestamp| *timestamp >= cutoff);
            removed += before - entries.pending.len();
        }
        self.len -= removed;
        self.evicted += removed as u64;
        removed
    }

    /// Remove the dispatch with the smallest timestamp. Ties go to the
    /// first-seen pid, then to the smallest key.
    pub fn evict_oldest(&mut self) -> Option<(i64, PendingKey, i64)> {
        let (slot, key, _) = self
            .pids
            .iter()
            .enumerate()
            .flat_map(|(slot, entries)| {
                entries
                    .pending
                    .iter()
                    .map(move |(key, timestamp)| (slot, key, *timestamp))
            })
            .min_by(|a, b| a.2.cmp(&b.2).then(a.0.cmp(&b.0)).then(a.1.cmp(b.1)))
            .map(|(slot, key, timestamp)| (slot, key.clone(), timestamp))?;

        let entries = &mut self.pids[slot];
        let timestamp = entries.pending.remove(&key)?;
        self.len -= 1;
        self.evicted += 1;
        debug!(
            "Evicted oldest dispatch pid={} {:?} at {}",
            entries.pid, key, timestamp
        );
        Some((entries.pid, key, timestamp))
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of outstanding dispatches across all pids
    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of distinct pids ever seen dispatching
    pub fn pid_count(&self) -> usize {
        self.pids.len()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
