//! Pending deferred calls.
//!
//! Every cue, milestone, announcement and progress tick the executor is
//! waiting on lives here as one entry. Cancelling is a drain of the whole
//! collection, so nothing scheduled before a cancel can fire after it.

use serde::{Deserialize, Serialize};

use crate::plan::Cue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Deferred {
    /// Plan cue by index.
    Cue { index: usize },
    /// Step lifecycle milestone by index.
    Milestone { index: usize },
    /// One-off cue that is not part of the plan (re-announcements).
    Announce { cue: Cue },
    Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEntry {
    pub fire_at_ms: u64,
    /// Tie-breaker: entries due at the same instant fire in insertion order.
    pub seq: u64,
    pub deferred: Deferred,
}

#[derive(Debug, Default, Clone)]
pub struct TimerSet {
    entries: Vec<TimerEntry>,
    next_seq: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at_ms: u64, deferred: Deferred) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(TimerEntry {
            fire_at_ms,
            seq,
            deferred,
        });
        seq
    }

    /// Re-insert an entry, keeping its sequence number.
    pub fn insert(&mut self, entry: TimerEntry) {
        self.next_seq = self.next_seq.max(entry.seq + 1);
        self.entries.push(entry);
    }

    /// Remove every entry, returned in firing order.
    pub fn cancel_all(&mut self) -> Vec<TimerEntry> {
        let mut drained = std::mem::take(&mut self.entries);
        drained.sort_by_key(|e| (e.fire_at_ms, e.seq));
        drained
    }

    /// Remove entries matching `pred`, returned in firing order.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TimerEntry) -> bool) -> Vec<TimerEntry> {
        let (mut removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| pred(e));
        self.entries = kept;
        removed.sort_by_key(|e| (e.fire_at_ms, e.seq));
        removed
    }

    /// Earliest entry due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<TimerEntry> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.fire_at_ms <= now_ms)
            .min_by_key(|(_, e)| (e.fire_at_ms, e.seq))
            .map(|(i, _)| i)?;
        Some(self.entries.swap_remove(idx))
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.fire_at_ms).min()
    }

    /// Move entries in place. `f` returns the new fire time or `None` to
    /// leave the entry untouched.
    pub fn retime(&mut self, mut f: impl FnMut(&TimerEntry) -> Option<u64>) {
        for entry in &mut self.entries {
            if let Some(at) = f(entry) {
                entry.fire_at_ms = at;
            }
        }
    }

    pub fn contains(&self, deferred: &Deferred) -> bool {
        self.entries.iter().any(|e| &e.deferred == deferred)
    }

    pub fn fire_time_of(&self, deferred: &Deferred) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| &e.deferred == deferred)
            .map(|e| e.fire_at_ms)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimerEntry> {
        self.entries.iter()
    }

    /// Entries in firing order.
    pub fn sorted(&self) -> Vec<TimerEntry> {
        let mut out = self.entries.clone();
        out.sort_by_key(|e| (e.fire_at_ms, e.seq));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
