//! Concurrency smoke tests: parallel lookups during stores, invalidation
//! happens-before, and sweeper coexistence.

mod common;

use common::{metadata, seed_pipeline_result, Harness, DIM};
use futures::future::join_all;
use ragcache_core::config::CacheConfig;
use ragcache_core::sweeper::TtlSweeper;
use ragcache_core::types::{CacheLayer, LookupResult, ScopeTag};
use ragcache_core::store::CacheStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn parallel_lookups_during_stores_never_error() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let scope = ScopeTag::Global;

    // Pre-seed some entries so lookups race against both hits and misses.
    for i in 0..10 {
        seed_pipeline_result(&harness, &format!("seed {i}"), &scope, "v1").await;
    }

    let mut tasks = Vec::new();
    for i in 0..20 {
        let cache = Arc::clone(&harness.cache);
        let scope = scope.clone();
        if i % 2 == 0 {
            tasks.push(tokio::spawn(async move {
                for j in 0..10 {
                    let query = format!("seed {}", (i + j) % 10);
                    // Hits or misses both fine; no panics, no errors.
                    let _ = cache.lookup(&query, &scope).await;
                }
            }));
        } else {
            tasks.push(tokio::spawn(async move {
                for j in 0..5 {
                    cache
                        .store_answer(
                            &format!("writer {i} round {j}"),
                            &scope,
                            "a",
                            metadata(10, "v1"),
                        )
                        .await
                        .expect("store");
                }
            }));
        }
    }

    for task in join_all(tasks).await {
        task.expect("task panicked");
    }

    // Index and store agree after the dust settles: every stored query is
    // findable again.
    for i in 0..10 {
        assert!(
            harness
                .cache
                .lookup(&format!("seed {i}"), &scope)
                .await
                .is_hit(),
            "seed {i} lost"
        );
    }
}

#[tokio::test]
async fn lookups_after_invalidation_never_see_stale_rows() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let scope = ScopeTag::Global;

    for i in 0..20 {
        seed_pipeline_result(&harness, &format!("doc question {i}"), &scope, "v1").await;
    }

    harness
        .cache
        .invalidate_by_source_version("v1")
        .await
        .expect("invalidate");
    harness.versions.set("v2");

    // Happens-before: every lookup issued after the call returned misses.
    let mut tasks = Vec::new();
    for i in 0..20 {
        let cache = Arc::clone(&harness.cache);
        let scope = scope.clone();
        tasks.push(tokio::spawn(async move {
            cache.lookup(&format!("doc question {i}"), &scope).await
        }));
    }
    for task in join_all(tasks).await {
        assert_eq!(task.expect("task"), LookupResult::Miss);
    }
}

#[tokio::test]
async fn sweeper_runs_alongside_traffic() {
    let config = CacheConfig::new(DIM).with_sweep_interval(Duration::from_millis(20));
    let harness = Harness::new(config).await;
    let scope = ScopeTag::Global;

    let sweeper = TtlSweeper::start(Arc::clone(&harness.cache));

    for i in 0..10 {
        harness
            .cache
            .store_answer(&format!("traffic {i}"), &scope, "a", metadata(5, "v1"))
            .await
            .expect("store");
        let _ = harness.cache.lookup(&format!("traffic {i}"), &scope).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    sweeper.shutdown().await;

    // Nothing expired (default TTL is long); everything survives the sweeps.
    assert_eq!(harness.store.count(CacheLayer::Answer).await.unwrap(), 10);
}

#[tokio::test]
async fn concurrent_stores_of_same_query_keep_one_row() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let scope = ScopeTag::Global;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let cache = Arc::clone(&harness.cache);
        let scope = scope.clone();
        tasks.push(tokio::spawn(async move {
            cache
                .store_answer("contended", &scope, &format!("answer {i}"), metadata(1, "v1"))
                .await
        }));
    }
    for task in join_all(tasks).await {
        task.expect("task").expect("store");
    }

    // First answer wins; exactly one live row regardless of interleaving.
    assert_eq!(harness.store.count(CacheLayer::Answer).await.unwrap(), 1);
    assert!(harness.cache.lookup("contended", &scope).await.is_hit());
}
