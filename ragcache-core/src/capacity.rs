//! Capacity management for the answer layer.
//!
//! Enforces the L1 entry cap with recency+frequency ranked eviction. L2 and
//! L3 rows share ids with their L1 row, so evicting an L1 id evicts the
//! whole column of derived work.

use crate::config::EvictionWeights;
use crate::types::AccessInfo;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Plans which entries to evict when the answer layer exceeds its cap.
///
/// Ranking score:
/// `rank = w_recency * normalize(now - last_accessed_at)
///        + w_frequency * 1 / (1 + access_count)`
/// where `normalize` maps ages linearly onto [0, 1] over the observed age
/// range. Higher rank means colder; the highest-ranked entries are evicted
/// first until the count drops to `max_entries * low_watermark`.
#[derive(Debug, Clone)]
pub struct CapacityPlanner {
    max_entries: usize,
    low_watermark: f64,
    weights: EvictionWeights,
}

impl CapacityPlanner {
    /// Create a planner.
    #[must_use]
    pub fn new(max_entries: usize, low_watermark: f64, weights: EvictionWeights) -> Self {
        Self {
            max_entries,
            low_watermark,
            weights,
        }
    }

    /// The configured answer-layer cap.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Whether `current_count` exceeds the cap.
    #[must_use]
    pub fn over_capacity(&self, current_count: usize) -> bool {
        current_count > self.max_entries
    }

    /// Target count after an eviction pass.
    #[must_use]
    pub fn watermark_count(&self) -> usize {
        (self.max_entries as f64 * self.low_watermark).floor() as usize
    }

    /// Pick the entries to evict, coldest first.
    ///
    /// Returns an empty vector when the set is within capacity.
    #[must_use]
    pub fn plan_evictions(&self, entries: &[AccessInfo], now: DateTime<Utc>) -> Vec<Uuid> {
        if !self.over_capacity(entries.len()) {
            return Vec::new();
        }

        let target = self.watermark_count();
        let evict_count = entries.len().saturating_sub(target);

        let mut ranked: Vec<(Uuid, f64, DateTime<Utc>)> = {
            let max_age = entries
                .iter()
                .map(|e| age_seconds(e.last_accessed_at, now))
                .fold(0.0_f64, f64::max)
                .max(1.0);

            entries
                .iter()
                .map(|e| {
                    let recency = age_seconds(e.last_accessed_at, now) / max_age;
                    let frequency = 1.0 / (1.0 + e.access_count as f64);
                    let rank = self.weights.recency * recency + self.weights.frequency * frequency;
                    (e.id, rank, e.created_at)
                })
                .collect()
        };

        // Coldest first; ties broken by age then id for determinism.
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.0.cmp(&b.0))
        });

        ranked.into_iter().take(evict_count).map(|(id, _, _)| id).collect()
    }
}

fn age_seconds(at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    // Millisecond resolution keeps ranking meaningful for entries touched
    // within the same second.
    (now - at).num_milliseconds().max(0) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn info(last_accessed_secs_ago: i64, access_count: u64, now: DateTime<Utc>) -> AccessInfo {
        AccessInfo {
            id: Uuid::new_v4(),
            last_accessed_at: now - Duration::seconds(last_accessed_secs_ago),
            access_count,
            created_at: now - Duration::seconds(last_accessed_secs_ago + 60),
        }
    }

    fn planner(max_entries: usize, low_watermark: f64) -> CapacityPlanner {
        CapacityPlanner::new(max_entries, low_watermark, EvictionWeights::default())
    }

    #[test]
    fn test_no_eviction_under_capacity() {
        let now = Utc::now();
        let p = planner(10, 0.9);
        let entries: Vec<AccessInfo> = (0..10).map(|i| info(i, 1, now)).collect();
        assert!(p.plan_evictions(&entries, now).is_empty());
    }

    #[test]
    fn test_eviction_to_watermark() {
        let now = Utc::now();
        let p = planner(10, 0.9);
        let entries: Vec<AccessInfo> = (0..11).map(|i| info(i, 1, now)).collect();

        let evicted = p.plan_evictions(&entries, now);
        // 11 entries, watermark floor(10 * 0.9) = 9, so evict 2
        assert_eq!(evicted.len(), 2);
    }

    #[test]
    fn test_coldest_evicted_first() {
        let now = Utc::now();
        let p = planner(3, 0.66);

        let hot = info(1, 3, now); // recent, frequent
        let warm = info(10, 2, now);
        let cold = info(3600, 1, now); // old, rarely used
        let new = info(2, 1, now);

        let entries = vec![hot.clone(), warm.clone(), cold.clone(), new.clone()];
        let evicted = p.plan_evictions(&entries, now);

        // 4 entries, watermark floor(3 * 0.66) = 1, evict 3: cold goes first
        assert_eq!(evicted.len(), 3);
        assert_eq!(evicted[0], cold.id);
        assert!(!evicted.contains(&hot.id));
    }

    #[test]
    fn test_frequency_breaks_recency_ties() {
        let now = Utc::now();
        let p = planner(2, 0.5);

        let frequent = info(100, 10, now);
        let rare = info(100, 1, now);
        let filler = info(100, 5, now);

        let entries = vec![frequent.clone(), rare.clone(), filler];
        let evicted = p.plan_evictions(&entries, now);

        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0], rare.id, "equal recency: lowest access_count evicts first");
        assert!(!evicted.contains(&frequent.id));
    }

    #[test]
    fn test_watermark_count() {
        assert_eq!(planner(10, 0.9).watermark_count(), 9);
        assert_eq!(planner(3, 0.66).watermark_count(), 1);
        assert_eq!(planner(100, 1.0).watermark_count(), 100);
    }

    #[test]
    fn test_deterministic_plan() {
        let now = Utc::now();
        let p = planner(5, 0.8);
        let entries: Vec<AccessInfo> = (0..8).map(|i| info(i * 10, (i % 3) as u64, now)).collect();

        let first = p.plan_evictions(&entries, now);
        let second = p.plan_evictions(&entries, now);
        assert_eq!(first, second);
    }
}
