use std::future::Future;

use super::{fixture_store_contents, CheckOutcome, CAT_URL, DOG_URL};
use crate::RecordStore;

pub(super) async fn run_index_checks<S, F, Fut>(factory: &F) -> Vec<CheckOutcome>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CheckOutcome::new(
            "index",
            "count_matches_distinct_request_ids",
            count_matches_distinct_request_ids(factory).await,
        ),
        CheckOutcome::new(
            "index",
            "associations_listed_in_index_order",
            associations_listed_in_index_order(factory).await,
        ),
        CheckOutcome::new(
            "index",
            "request_ids_for_input_in_index_order",
            request_ids_for_input_in_index_order(factory).await,
        ),
        CheckOutcome::new(
            "index",
            "request_ids_for_unknown_input_is_empty",
            request_ids_for_unknown_input_is_empty(factory).await,
        ),
    ]
}

// ── 1. count is over request ids, not rows ──────────────────────────────────

async fn count_matches_distinct_request_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let count = s
        .count_distinct_requests()
        .await
        .map_err(|e| format!("count: {e}"))?;
    if count != 3 {
        return Err(format!("expected 3 distinct requests, got {count}"));
    }
    Ok(())
}

// ── 2. rows come back oldest first ──────────────────────────────────────────

async fn associations_listed_in_index_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rows = s
        .list_distinct_input_associations()
        .await
        .map_err(|e| format!("list: {e}"))?;
    let (expected, _) = fixture_store_contents();
    if rows != expected {
        return Err(format!("expected {expected:?}, got {rows:?}"));
    }
    Ok(())
}

// ── 3. lookup by input url ──────────────────────────────────────────────────

async fn request_ids_for_input_in_index_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let cat = s
        .request_ids_for_input(CAT_URL)
        .await
        .map_err(|e| format!("lookup cat: {e}"))?;
    if cat != ["req-a", "req-c"] {
        return Err(format!("expected [req-a, req-c] for cat, got {cat:?}"));
    }
    let dog = s
        .request_ids_for_input(DOG_URL)
        .await
        .map_err(|e| format!("lookup dog: {e}"))?;
    if dog != ["req-c"] {
        return Err(format!("expected [req-c] for dog, got {dog:?}"));
    }
    Ok(())
}

async fn request_ids_for_unknown_input_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ids = s
        .request_ids_for_input("https://uploads.example/none.png")
        .await
        .map_err(|e| format!("lookup: {e}"))?;
    if !ids.is_empty() {
        return Err(format!("expected no ids, got {ids:?}"));
    }
    Ok(())
}
