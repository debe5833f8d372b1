//! Recompute coalescing under overlapping visibility changes.

mod common;

use common::{assert_consistent, edge_pairs, engine_with, pair, visible_ids, MockNamespace};
use foldgraph_core::{RecomputeOutcome, Status};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn namespace() -> MockNamespace {
    MockNamespace::new()
        .dir("R", &["A"], &["B"])
        .dir("R/A", &[], &["x", "y"])
        .bucket_edge("R/A/x", "R/B")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_change_during_pass_is_picked_up() {
    let service = Arc::new(namespace());
    let engine = Arc::new(engine_with(service.clone()));
    engine.load_root("R").await.unwrap();
    engine.expand("R/A").await.unwrap();
    assert_eq!(edge_pairs(&engine), vec![pair("R/A/x", "R/B")]);

    service.arm_pause();
    let background = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.recompute().await })
    };
    service.pause.entered.notified().await;

    // The first pass is suspended in its bucket fetch
    let outcome = engine.collapse("R/A").await.unwrap();
    assert_eq!(outcome, RecomputeOutcome::Coalesced);
    assert!(engine.recompute().await.is_coalesced());

    service.pause.release.notify_one();
    let finished = background.await.unwrap();

    let summary = finished.summary().copied().unwrap();
    assert_eq!(summary.passes, 2);
    assert_eq!(edge_pairs(&engine), vec![pair("R/A", "R/B")]);
    assert_eq!(engine.status(), Status::Ready { nodes: 3, edges: 1 });
    assert_consistent(&engine);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_fetch_never_commits_dangling_edges() {
    let service = Arc::new(namespace());
    let engine = Arc::new(engine_with(service.clone()));
    engine.load_root("R").await.unwrap();
    engine.expand("R/A").await.unwrap();

    service.arm_pause();
    let background = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.recompute().await })
    };
    service.pause.entered.notified().await;

    // Hide R/A/x while its record is in flight
    engine.collapse("R/A").await.unwrap();
    let store = engine.store();
    let links_before_release = store.read().link_count();
    assert_eq!(links_before_release, 1);

    service.pause.release.notify_one();
    background.await.unwrap();
    assert_consistent(&engine);
}

#[tokio::test]
async fn test_sequential_requests_each_commit() {
    let service = Arc::new(namespace());
    let engine = engine_with(service.clone());
    engine.load_root("R").await.unwrap();
    let calls = service.bucket_calls.load(Ordering::SeqCst);

    let first = engine.recompute().await;
    let second = engine.recompute().await;

    let first = first.summary().copied().unwrap();
    let second = second.summary().copied().unwrap();
    assert_eq!(first.passes, 1);
    assert!(second.token > first.token);
    assert_eq!(service.bucket_calls.load(Ordering::SeqCst), calls + 2);
}

#[tokio::test]
async fn test_link_generation_advances_per_commit() {
    let engine = engine_with(Arc::new(namespace()));
    engine.load_root("R").await.unwrap();
    let store = engine.store();
    let generation = store.read().link_generation();

    engine.expand("R/A").await.unwrap();
    assert_eq!(store.read().link_generation(), generation + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_collapse_during_first_expand_wins() {
    let service = Arc::new(namespace());
    let engine = Arc::new(engine_with(service.clone()));
    engine.load_root("R").await.unwrap();

    service.arm_listing_pause("R/A");
    let background = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.expand("R/A").await })
    };
    service.listing_pause.entered.notified().await;

    // The expand is suspended in its listing fetch
    engine.collapse("R/A").await.unwrap();
    service.listing_pause.release.notify_one();
    background.await.unwrap().unwrap();

    let state = engine.directory_state("R/A").unwrap();
    assert!(!state.expanded);
    assert!(state.children_loaded);
    assert_eq!(engine.store().read().children("R/A").len(), 2);
    assert_eq!(visible_ids(&engine), vec!["R", "R/A", "R/B"]);
    assert_eq!(edge_pairs(&engine), vec![pair("R/A", "R/B")]);
    assert_consistent(&engine);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expand_after_collapse_during_load_reveals_children() {
    let service = Arc::new(namespace());
    let engine = Arc::new(engine_with(service.clone()));
    engine.load_root("R").await.unwrap();

    service.arm_listing_pause("R/A");
    let background = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.expand("R/A").await })
    };
    service.listing_pause.entered.notified().await;

    engine.collapse("R/A").await.unwrap();
    // Joins the load in flight instead of listing again
    engine.expand("R/A").await.unwrap();
    service.listing_pause.release.notify_one();
    background.await.unwrap().unwrap();

    assert_eq!(service.listing_calls("R/A"), 1);
    assert!(engine.directory_state("R/A").unwrap().expanded);
    assert_eq!(
        visible_ids(&engine),
        vec!["R", "R/A", "R/A/x", "R/A/y", "R/B"]
    );
    assert_eq!(edge_pairs(&engine), vec![pair("R/A/x", "R/B")]);
    assert_consistent(&engine);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_pass_leaves_request_pending() {
    let service = Arc::new(namespace());
    let engine = Arc::new(engine_with(service.clone()));
    engine.load_root("R").await.unwrap();
    engine.expand("R/A").await.unwrap();

    service.arm_pause();
    let background = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.recompute().await })
    };
    service.pause.entered.notified().await;

    assert!(engine.collapse("R/A").await.unwrap().is_coalesced());
    background.abort();
    assert!(background.await.unwrap_err().is_cancelled());

    assert!(engine.needs_recompute());
    assert_eq!(edge_pairs(&engine), vec![pair("R/A/x", "R/B")]);

    let outcome = engine.recompute().await;
    assert!(!outcome.is_coalesced());
    assert!(!engine.needs_recompute());
    assert_eq!(edge_pairs(&engine), vec![pair("R/A", "R/B")]);
    assert_consistent(&engine);
}
