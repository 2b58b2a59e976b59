//! Cross-cutting invariants: determinism, idempotent invalidation, purge
//! completeness, rebuild equivalence, boundary behaviors.

mod common;

use common::{metadata, seed_pipeline_result, Harness, DIM};
use ragcache_core::config::CacheConfig;
use ragcache_core::error::Error;
use ragcache_core::store::CacheStore;
use ragcache_core::types::{CacheLayer, LookupResult, ScopeTag};

#[tokio::test]
async fn lookup_is_deterministic_for_fixed_state() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    seed_pipeline_result(&harness, "fixed question", &ScopeTag::Global, "v1").await;

    let mut answers = Vec::new();
    for _ in 0..5 {
        match harness.cache.lookup("fixed question", &ScopeTag::Global).await {
            LookupResult::AnswerHit { answer_text, similarity, .. } => {
                answers.push((answer_text, similarity.to_bits()));
            }
            other => panic!("expected AnswerHit, got {other:?}"),
        }
    }
    answers.dedup();
    assert_eq!(answers.len(), 1, "lookup results varied: {answers:?}");
}

#[tokio::test]
async fn invalidation_is_idempotent() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    seed_pipeline_result(&harness, "q", &ScopeTag::Global, "v1").await;

    harness.cache.invalidate_by_source_version("v1").await.unwrap();
    let count_after_first = harness.store.count(CacheLayer::Answer).await.unwrap();

    harness.cache.invalidate_by_source_version("v1").await.unwrap();
    assert_eq!(harness.store.count(CacheLayer::Answer).await.unwrap(), count_after_first);
    assert_eq!(count_after_first, 0);
}

#[tokio::test]
async fn purge_scope_leaves_no_trace_under_any_scope() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let alice = ScopeTag::User("alice".into());

    seed_pipeline_result(&harness, "alice asks", &alice, "v1").await;
    harness.cache.purge_scope(&alice).await.unwrap();

    for scope in [alice.clone(), ScopeTag::Global, ScopeTag::User("bob".into())] {
        assert_eq!(
            harness.cache.lookup("alice asks", &scope).await,
            LookupResult::Miss,
            "purged entry visible under {scope}"
        );
    }
    for layer in CacheLayer::ALL {
        assert_eq!(harness.store.count(layer).await.unwrap(), 0);
    }
}

#[tokio::test]
async fn store_twice_keeps_first_answer_and_created_at() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let scope = ScopeTag::Global;
    let id = ragcache_core::types::derive_entry_id("q", &scope);

    harness
        .cache
        .store_answer("q", &scope, "first", metadata(10, "v1"))
        .await
        .unwrap();
    let first = harness
        .store
        .fetch_by_ids(CacheLayer::Answer, &[id], None)
        .await
        .unwrap();
    let first_created = first[0].header().created_at;

    harness
        .cache
        .store_answer("q", &scope, "second", metadata(10, "v1"))
        .await
        .unwrap();

    let rows = harness
        .store
        .fetch_by_ids(CacheLayer::Answer, &[id], None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].header().created_at, first_created);
    match &rows[0] {
        ragcache_core::types::CacheEntry::Answer(record) => {
            assert_eq!(record.answer_text, "first");
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[tokio::test]
async fn rebuild_from_store_preserves_lookup_results() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    seed_pipeline_result(&harness, "What is life?", &ScopeTag::Global, "v1").await;

    let before = harness.cache.lookup("What is life?", &ScopeTag::Global).await;
    for layer in CacheLayer::ALL {
        harness.cache.rebuild_index(layer).await.unwrap();
    }
    let after = harness.cache.lookup("What is life?", &ScopeTag::Global).await;

    match (before, after) {
        (
            LookupResult::AnswerHit { answer_text: a, similarity: s1, .. },
            LookupResult::AnswerHit { answer_text: b, similarity: s2, .. },
        ) => {
            assert_eq!(a, b);
            assert!((s1 - s2).abs() < f32::EPSILON);
        }
        other => panic!("rebuild changed the outcome: {other:?}"),
    }
}

#[tokio::test]
async fn stored_embeddings_are_unit_norm() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    for i in 0..5 {
        seed_pipeline_result(&harness, &format!("query {i}"), &ScopeTag::Global, "v1").await;
    }

    for layer in CacheLayer::ALL {
        for (_, embedding, _) in harness.store.load_layer(layer).await.unwrap() {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() <= 1e-5, "norm {norm} breaks the invariant");
        }
    }
}

#[tokio::test]
async fn access_count_is_at_least_one_and_grows() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let scope = ScopeTag::Global;
    seed_pipeline_result(&harness, "q", &scope, "v1").await;
    let id = ragcache_core::types::derive_entry_id("q", &scope);

    let rows = harness
        .store
        .fetch_by_ids(CacheLayer::Answer, &[id], None)
        .await
        .unwrap();
    assert_eq!(rows[0].header().access_count, 1);

    assert!(harness.cache.lookup("q", &scope).await.is_hit());
    let rows = harness
        .store
        .fetch_by_ids(CacheLayer::Answer, &[id], None)
        .await
        .unwrap();
    assert_eq!(rows[0].header().access_count, 2);
}

#[tokio::test]
async fn ttl_zero_documented_as_never_expiring() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    harness
        .cache
        .store_answer("eternal", &ScopeTag::Global, "a", metadata(1, "v1").with_ttl(0))
        .await
        .unwrap();

    assert_eq!(harness.cache.sweep_expired().await.unwrap(), 0);
    assert!(harness.cache.lookup("eternal", &ScopeTag::Global).await.is_hit());
}

#[tokio::test]
async fn negative_ttl_rejected_at_store_time() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    let result = harness
        .cache
        .store_answer("q", &ScopeTag::Global, "a", metadata(1, "v1").with_ttl(-1))
        .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn stats_survive_restart_through_daily_flush() {
    let harness = Harness::new(CacheConfig::new(DIM)).await;
    seed_pipeline_result(&harness, "q", &ScopeTag::Global, "v1").await;
    assert!(harness.cache.lookup("q", &ScopeTag::Global).await.is_hit());
    assert_eq!(harness.cache.lookup("other", &ScopeTag::Global).await, LookupResult::Miss);

    harness.cache.flush_daily_stats().await.unwrap();

    let today = chrono::Utc::now().date_naive();
    let persisted = harness.store.load_daily_stats(today).await.unwrap().unwrap();
    assert_eq!(persisted.total_queries, 2);
    assert_eq!(persisted.l1_hits, 1);
    assert_eq!(persisted.misses, 1);
    assert_eq!(persisted.tokens_saved, 1000);
}
