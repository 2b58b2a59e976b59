//! Lock-free cache statistics.
//!
//! Counters are plain atomics: updates never block a lookup and snapshot
//! reads are lock-free (they may lag a concurrent update by one increment).
//! The background sweeper periodically drains the counters into the
//! persistent `daily_stats` table.

use crate::types::{CacheLayer, DailyStats, HealthState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Cost figures are accumulated in micro-dollars so they fit an atomic
/// counter without losing the cents that individual queries save.
const MICRO_DOLLARS: f64 = 1_000_000.0;

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Total lookups since start (or last drain)
    pub total_queries: u64,
    /// Answer-layer hits
    pub l1_hits: u64,
    /// Compressed-layer hits
    pub l2_hits: u64,
    /// Chunk-layer hits
    pub l3_hits: u64,
    /// Complete misses
    pub misses: u64,
    /// Tokens not re-spent thanks to answer hits
    pub tokens_saved: u64,
    /// Estimated generation cost avoided, in USD
    pub estimated_cost_saved: f64,
    /// Operational health at snapshot time
    pub health: HealthState,
}

impl StatsSnapshot {
    /// Overall hit rate across all layers (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            (self.l1_hits + self.l2_hits + self.l3_hits) as f64 / self.total_queries as f64
        }
    }
}

/// Atomic counter block shared by the orchestrator and the sweeper.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    total_queries: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    l3_hits: AtomicU64,
    misses: AtomicU64,
    tokens_saved: AtomicU64,
    cost_saved_micros: AtomicU64,
    health: AtomicU8,
}

impl StatsRecorder {
    /// Fresh recorder with zeroed counters and `Healthy` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit at `layer`; answer hits also tally savings.
    pub fn record_hit(&self, layer: CacheLayer, tokens_saved: u64, cost_per_1k_tokens: f64) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        match layer {
            CacheLayer::Answer => {
                self.l1_hits.fetch_add(1, Ordering::Relaxed);
                self.tokens_saved.fetch_add(tokens_saved, Ordering::Relaxed);
                let micros =
                    (tokens_saved as f64 / 1000.0 * cost_per_1k_tokens * MICRO_DOLLARS) as u64;
                self.cost_saved_micros.fetch_add(micros, Ordering::Relaxed);
            }
            CacheLayer::Compressed => {
                self.l2_hits.fetch_add(1, Ordering::Relaxed);
            }
            CacheLayer::Chunks => {
                self.l3_hits.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a complete miss.
    pub fn record_miss(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Current operational health.
    #[must_use]
    pub fn health(&self) -> HealthState {
        match self.health.load(Ordering::Relaxed) {
            1 => HealthState::CoherenceDegraded,
            2 => HealthState::StoreUnavailable,
            _ => HealthState::Healthy,
        }
    }

    /// Transition the health signal.
    pub fn set_health(&self, state: HealthState) {
        let raw = match state {
            HealthState::Healthy => 0,
            HealthState::CoherenceDegraded => 1,
            HealthState::StoreUnavailable => 2,
        };
        self.health.store(raw, Ordering::Relaxed);
    }

    /// Lock-free snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            l3_hits: self.l3_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
            estimated_cost_saved: self.cost_saved_micros.load(Ordering::Relaxed) as f64
                / MICRO_DOLLARS,
            health: self.health(),
        }
    }

    /// Drain the counters into a [`DailyStats`] bucket for today (UTC).
    ///
    /// Counters reset to zero; the caller accumulates the returned bucket
    /// into the persistent daily-stats table. Returns `None` when nothing
    /// was recorded since the last drain.
    #[must_use]
    pub fn drain_daily(&self) -> Option<DailyStats> {
        let total_queries = self.total_queries.swap(0, Ordering::Relaxed);
        let l1_hits = self.l1_hits.swap(0, Ordering::Relaxed);
        let l2_hits = self.l2_hits.swap(0, Ordering::Relaxed);
        let l3_hits = self.l3_hits.swap(0, Ordering::Relaxed);
        let misses = self.misses.swap(0, Ordering::Relaxed);
        let tokens_saved = self.tokens_saved.swap(0, Ordering::Relaxed);
        let cost_micros = self.cost_saved_micros.swap(0, Ordering::Relaxed);

        if total_queries == 0 && tokens_saved == 0 {
            return None;
        }

        Some(DailyStats {
            date: Utc::now().date_naive(),
            total_queries,
            l1_hits,
            l2_hits,
            l3_hits,
            misses,
            tokens_saved,
            estimated_cost_saved: cost_micros as f64 / MICRO_DOLLARS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss_counting() {
        let stats = StatsRecorder::new();
        stats.record_hit(CacheLayer::Answer, 1000, 0.002);
        stats.record_hit(CacheLayer::Compressed, 0, 0.002);
        stats.record_hit(CacheLayer::Chunks, 0, 0.002);
        stats.record_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_queries, 4);
        assert_eq!(snapshot.l1_hits, 1);
        assert_eq!(snapshot.l2_hits, 1);
        assert_eq!(snapshot.l3_hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.tokens_saved, 1000);
        assert!((snapshot.estimated_cost_saved - 0.002).abs() < 1e-9);
        assert!((snapshot.hit_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_only_answer_hits_save_tokens() {
        let stats = StatsRecorder::new();
        stats.record_hit(CacheLayer::Compressed, 500, 0.002);
        assert_eq!(stats.snapshot().tokens_saved, 0);
    }

    #[test]
    fn test_health_transitions() {
        let stats = StatsRecorder::new();
        assert_eq!(stats.health(), HealthState::Healthy);

        stats.set_health(HealthState::CoherenceDegraded);
        assert_eq!(stats.health(), HealthState::CoherenceDegraded);
        assert_eq!(stats.snapshot().health, HealthState::CoherenceDegraded);

        stats.set_health(HealthState::StoreUnavailable);
        assert_eq!(stats.health(), HealthState::StoreUnavailable);
    }

    #[test]
    fn test_drain_resets_counters() {
        let stats = StatsRecorder::new();
        stats.record_hit(CacheLayer::Answer, 100, 0.002);
        stats.record_miss();

        let bucket = stats.drain_daily().unwrap();
        assert_eq!(bucket.total_queries, 2);
        assert_eq!(bucket.l1_hits, 1);
        assert_eq!(bucket.misses, 1);
        assert_eq!(bucket.tokens_saved, 100);

        assert!(stats.drain_daily().is_none());
        assert_eq!(stats.snapshot().total_queries, 0);
    }

    #[test]
    fn test_empty_hit_rate() {
        assert!((StatsRecorder::new().snapshot().hit_rate()).abs() < f64::EPSILON);
    }
}
