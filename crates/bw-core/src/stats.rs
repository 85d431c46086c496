//! Match observers and statistics
//!
//! The engine reports cache traffic and verdicts to an optional
//! [`MatchObserver`]. [`MatchStats`] is the stock implementation: lock-free
//! counters that can be snapshotted for display.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::types::Verdict;

/// Receives events from the matching hot path.
///
/// Called concurrently from every matching thread; implementations must not
/// block.
pub trait MatchObserver: Send + Sync {
    fn cache_hit(&self, _blocked: bool) {}

    fn cache_miss(&self) {}

    /// Called once per match, cached or not.
    fn verdict(&self, _verdict: &Verdict<'_>, _elapsed: Duration) {}
}

/// Atomic match counters.
#[derive(Debug, Default)]
pub struct MatchStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    filtered: AtomicU64,
    exceptions: AtomicU64,
    matches: AtomicU64,
    total_nanos: AtomicU64,
}

/// Point-in-time copy of [`MatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub filtered: u64,
    pub exceptions: u64,
    pub avg_matching_nanos: u64,
}

impl MatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let matches = self.matches.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
            avg_matching_nanos: if matches == 0 { 0 } else { total / matches },
        }
    }
}

impl MatchObserver for MatchStats {
    fn cache_hit(&self, _blocked: bool) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn verdict(&self, verdict: &Verdict<'_>, elapsed: Duration) {
        match verdict {
            Verdict::Blocked(_) => {
                self.filtered.fetch_add(1, Ordering::Relaxed);
            }
            Verdict::ExceptedBy(_) => {
                self.exceptions.fetch_add(1, Ordering::Relaxed);
            }
            Verdict::Allowed => {}
        }
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.matches.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cache hits: {}, cache misses: {}, filtered: {}, exceptioned: {}, avg matching time: {:?}",
            self.cache_hits,
            self.cache_misses,
            self.filtered,
            self.exceptions,
            Duration::from_nanos(self.avg_matching_nanos)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_verdicts() {
        let stats = MatchStats::new();
        stats.cache_miss();
        stats.verdict(&Verdict::Allowed, Duration::from_micros(2));
        stats.cache_hit(true);
        stats.verdict(&Verdict::Blocked(None), Duration::from_micros(4));

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.filtered, 1);
        assert_eq!(snap.exceptions, 0);
        assert_eq!(snap.avg_matching_nanos, 3_000);
    }

    #[test]
    fn test_empty_average() {
        assert_eq!(MatchStats::new().snapshot().avg_matching_nanos, 0);
    }

    #[test]
    fn test_display() {
        let snap = StatsSnapshot {
            cache_hits: 3,
            cache_misses: 4,
            filtered: 1,
            exceptions: 2,
            avg_matching_nanos: 1_500,
        };
        assert_eq!(
            snap.to_string(),
            "cache hits: 3, cache misses: 4, filtered: 1, exceptioned: 2, avg matching time: 1.5µs"
        );
    }
}
