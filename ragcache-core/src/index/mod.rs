//! Per-layer vector index over live cache entries.
//!
//! The index mirrors exactly the live entry set of its layer: the
//! orchestrator updates it under the same writer lock as the persistent
//! store, so the two cannot diverge between lookups.
//!
//! Below `brute_force_cutoff` the index is a linear scan over live entries
//! (preferred for simplicity and exact recall). Above the cutoff it switches
//! to partitioned approximate search: entries are assigned to the nearest of
//! roughly sqrt(n) centroids and a search probes only the `nprobe` nearest
//! partitions. Deletions tombstone their partition assignment; once
//! tombstones exceed 20% of the live size the partitions are rebuilt.

use crate::constants::TOMBSTONE_REBUILD_FRACTION;
use crate::embeddings::similarity::{cosine_similarity, top_k_by_similarity};
use crate::types::ScopeTag;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// A vector registered in the index, with its visibility scope.
///
/// Scope lives in the index so that visibility filtering happens before
/// similarity thresholding and before top-k truncation: invisible entries
/// never consume candidate slots.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVector {
    /// L2-normalized embedding
    pub embedding: Vec<f32>,
    /// Visibility partition of the entry
    pub scope: ScopeTag,
}

/// A search candidate: entry id and cosine score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Entry id
    pub id: Uuid,
    /// Cosine similarity to the query
    pub score: f32,
}

/// Centroid-partitioned structure used above the brute-force cutoff.
#[derive(Debug, Clone)]
struct Partitions {
    centroids: Vec<Vec<f32>>,
    /// Ids assigned per centroid; may contain stale ids until rebuild
    buckets: Vec<Vec<Uuid>>,
}

/// In-memory vector index for one cache layer.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    brute_force_cutoff: usize,
    nprobe: usize,
    entries: HashMap<Uuid, IndexedVector>,
    partitions: Option<Partitions>,
    /// Stale partition assignments accumulated since the last rebuild
    tombstones: usize,
}

impl VectorIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(dimension: usize, brute_force_cutoff: usize, nprobe: usize) -> Self {
        Self {
            dimension,
            brute_force_cutoff,
            nprobe: nprobe.max(1),
            entries: HashMap::new(),
            partitions: None,
            tombstones: 0,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the index is currently running approximate search.
    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        self.partitions.is_some()
    }

    /// Register or replace an entry.
    ///
    /// Idempotent: re-adding an id with the identical embedding is a no-op.
    /// Re-adding with a different embedding replaces the old vector and
    /// tombstones its stale partition assignment.
    pub fn add(&mut self, id: Uuid, embedding: Vec<f32>, scope: ScopeTag) {
        debug_assert_eq!(embedding.len(), self.dimension);

        if let Some(existing) = self.entries.get(&id) {
            if existing.embedding == embedding {
                return;
            }
            // Replacement: the old bucket assignment goes stale.
            if self.partitions.is_some() {
                self.tombstones += 1;
            }
        }

        if let Some(partitions) = &mut self.partitions {
            let bucket = nearest_centroid(&partitions.centroids, &embedding);
            partitions.buckets[bucket].push(id);
        }

        self.entries.insert(id, IndexedVector { embedding, scope });

        if self.partitions.is_none() && self.entries.len() > self.brute_force_cutoff {
            self.rebuild_partitions();
        } else {
            self.maybe_rebuild();
        }
    }

    /// Remove an entry. Best-effort: unknown ids are ignored.
    pub fn remove(&mut self, id: Uuid) {
        if self.entries.remove(&id).is_some() && self.partitions.is_some() {
            self.tombstones += 1;
            self.maybe_rebuild();
        }
    }

    /// Remove a batch of entries.
    pub fn remove_all(&mut self, ids: &[Uuid]) {
        for id in ids {
            if self.entries.remove(id).is_some() && self.partitions.is_some() {
                self.tombstones += 1;
            }
        }
        self.maybe_rebuild();
    }

    /// Drop everything and load the given live set, rebuilding partitions
    /// if the set is above the cutoff.
    pub fn rebuild_from(&mut self, live: Vec<(Uuid, Vec<f32>, ScopeTag)>) {
        self.entries = live
            .into_iter()
            .map(|(id, embedding, scope)| (id, IndexedVector { embedding, scope }))
            .collect();
        self.partitions = None;
        self.tombstones = 0;
        if self.entries.len() > self.brute_force_cutoff {
            self.rebuild_partitions();
        }
    }

    /// Top-k entries visible to `caller`, by descending cosine similarity.
    ///
    /// Equal scores tie-break on id so results are deterministic.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, caller: &ScopeTag) -> Vec<Candidate> {
        match &self.partitions {
            None => self.scan(self.entries.keys().copied(), query, k, caller),
            Some(partitions) => {
                let probes = self.probe_order(partitions, query);
                let ids = probes
                    .iter()
                    .flat_map(|&bucket| partitions.buckets[bucket].iter().copied());
                self.scan(ids, query, k, caller)
            }
        }
    }

    /// Exact top-k over the whole live set, ignoring partitions.
    ///
    /// Used by the recall self-test as ground truth.
    #[must_use]
    pub fn search_exact(&self, query: &[f32], k: usize, caller: &ScopeTag) -> Vec<Candidate> {
        self.scan(self.entries.keys().copied(), query, k, caller)
    }

    /// Estimate recall@k of approximate search against brute force.
    ///
    /// Samples up to `sample_size` stored vectors as queries. Returns 1.0
    /// when the index is not partitioned (linear scan is exact).
    #[must_use]
    pub fn self_test_recall(&self, k: usize, sample_size: usize) -> f64 {
        if self.partitions.is_none() || self.entries.is_empty() {
            return 1.0;
        }

        let mut sample_ids: Vec<Uuid> = self.entries.keys().copied().collect();
        sample_ids.sort_unstable();
        let stride = (sample_ids.len() / sample_size.max(1)).max(1);
        let queries: Vec<&IndexedVector> = sample_ids
            .iter()
            .step_by(stride)
            .take(sample_size)
            .filter_map(|id| self.entries.get(id))
            .collect();

        let mut found = 0usize;
        let mut expected = 0usize;
        for query in queries {
            let exact = self.search_exact(&query.embedding, k, &query.scope);
            let approx = self.search(&query.embedding, k, &query.scope);
            expected += exact.len();
            for candidate in &exact {
                if approx.iter().any(|c| c.id == candidate.id) {
                    found += 1;
                }
            }
        }

        if expected == 0 {
            1.0
        } else {
            found as f64 / expected as f64
        }
    }

    /// Visibility-filter the candidate ids, then rank them with the brute
    /// force scan kernel. Partition buckets can hand the same id over
    /// twice (stale assignments), so duplicates are dropped up front.
    fn scan<I>(&self, ids: I, query: &[f32], k: usize, caller: &ScopeTag) -> Vec<Candidate>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut seen = HashSet::new();
        let visible = ids.into_iter().filter_map(|id| {
            if !seen.insert(id) {
                return None;
            }
            let entry = self.entries.get(&id)?;
            entry
                .scope
                .visible_to(caller)
                .then(|| (id, entry.embedding.as_slice()))
        });

        top_k_by_similarity(query, visible, k)
            .into_iter()
            .map(|(id, score)| Candidate { id, score })
            .collect()
    }

    fn probe_order(&self, partitions: &Partitions, query: &[f32]) -> Vec<usize> {
        let mut by_distance: Vec<(usize, f32)> = partitions
            .centroids
            .iter()
            .enumerate()
            .map(|(i, centroid)| (i, cosine_similarity(query, centroid)))
            .collect();
        by_distance.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        by_distance
            .into_iter()
            .take(self.nprobe)
            .map(|(i, _)| i)
            .collect()
    }

    fn maybe_rebuild(&mut self) {
        if self.partitions.is_none() {
            return;
        }

        if self.entries.len() <= self.brute_force_cutoff {
            // Shrunk back under the cutoff: linear scan is exact and cheaper.
            info!(live = self.entries.len(), "index dropped below cutoff, reverting to linear scan");
            self.partitions = None;
            self.tombstones = 0;
            return;
        }

        let threshold = (self.entries.len() as f64 * TOMBSTONE_REBUILD_FRACTION).ceil() as usize;
        if self.tombstones > threshold {
            self.rebuild_partitions();
        }
    }

    /// Rebuild the centroid partitions from the current live set.
    fn rebuild_partitions(&mut self) {
        let n = self.entries.len();
        if n == 0 {
            self.partitions = None;
            self.tombstones = 0;
            return;
        }

        let num_centroids = (n as f64).sqrt().ceil() as usize;

        // Deterministic centroid sampling: stride over sorted ids.
        let mut ids: Vec<Uuid> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        let stride = (n / num_centroids).max(1);
        let centroids: Vec<Vec<f32>> = ids
            .iter()
            .step_by(stride)
            .take(num_centroids)
            .filter_map(|id| self.entries.get(id).map(|e| e.embedding.clone()))
            .collect();

        let mut buckets: Vec<Vec<Uuid>> = vec![Vec::new(); centroids.len()];
        for (id, entry) in &self.entries {
            let bucket = nearest_centroid(&centroids, &entry.embedding);
            buckets[bucket].push(*id);
        }

        debug!(live = n, centroids = centroids.len(), "rebuilt index partitions");
        self.partitions = Some(Partitions { centroids, buckets });
        self.tombstones = 0;
    }
}

fn nearest_centroid(centroids: &[Vec<f32>], embedding: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let score = cosine_similarity(embedding, centroid);
        if score > best_score {
            best_score = score;
            best = i;
        }
    }
    best
}
