//! Round-robin selection over ready shards.
//!
//! Replaces time-derived hashing, which collides when several requests
//! arrive within the same clock tick.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free round-robin index selector
#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Next index in `0..count`, or `None` when `count` is zero
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(idx % count)
    }

    /// Selections made so far
    pub fn current(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_through_indices() {
        let lb = RoundRobinBalancer::new();

        assert_eq!(lb.next(3), Some(0));
        assert_eq!(lb.next(3), Some(1));
        assert_eq!(lb.next(3), Some(2));
        assert_eq!(lb.next(3), Some(0));
    }

    #[test]
    fn test_zero_count() {
        let lb = RoundRobinBalancer::new();
        assert_eq!(lb.next(0), None);
        assert_eq!(lb.current(), 0);
    }

    #[test]
    fn test_pool_size_changes() {
        let lb = RoundRobinBalancer::new();
        assert_eq!(lb.next(2), Some(0));
        assert_eq!(lb.next(2), Some(1));

        // A shard became ready between requests
        assert_eq!(lb.next(3), Some(2));
        assert_eq!(lb.next(3), Some(0));
    }

    #[test]
    fn test_even_spread() {
        let lb = RoundRobinBalancer::new();
        let mut hits = [0usize; 4];
        for _ in 0..400 {
            hits[lb.next(4).unwrap()] += 1;
        }
        assert!(hits.iter().all(|&h| h == 100));
    }
}
