//! Deleted-message ranges and their normalization.

use serde::{Deserialize, Serialize};

/// Inclusive range of message sequence ids. A single id has `hi == low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub low: i64,
    pub hi: i64,
}

impl Range {
    pub fn new(low: i64, hi: i64) -> Self {
        Self { low, hi }
    }

    pub fn single(id: i64) -> Self {
        Self { low: id, hi: id }
    }

    /// Upper bound, treating `hi < low` as a single id.
    #[inline]
    pub fn upper(&self) -> i64 {
        self.hi.max(self.low)
    }

    #[inline]
    pub fn contains(&self, seq_id: i64) -> bool {
        seq_id >= self.low && seq_id <= self.upper()
    }
}

/// Sort ranges by lower bound and merge any that overlap or touch.
///
/// The result is the minimal ascending list of disjoint ranges covering the
/// same ids.
pub fn normalize(ranges: &mut Vec<Range>) {
    if ranges.is_empty() {
        return;
    }
    ranges.sort_by_key(|r| (r.low, r.upper()));

    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for r in ranges.drain(..) {
        let hi = r.upper();
        match merged.last_mut() {
            Some(last) if r.low.saturating_sub(1) <= last.hi => {
                last.hi = last.hi.max(hi);
            }
            _ => merged.push(Range::new(r.low, hi)),
        }
    }
    *ranges = merged;
}

/// Total number of ids covered by a normalized list.
pub fn count(ranges: &[Range]) -> i64 {
    ranges.iter().map(|r| r.upper() - r.low + 1).sum()
}
