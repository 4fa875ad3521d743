use std::future::Future;

use super::{CheckOutcome, REQ_A_GOOD_URL};
use crate::{RecordStore, StorageError};

pub(super) async fn run_fetch_checks<S, F, Fut>(factory: &F) -> Vec<CheckOutcome>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        CheckOutcome::new(
            "fetch",
            "get_record_returns_stored_record",
            get_record_returns_stored_record(factory).await,
        ),
        CheckOutcome::new(
            "fetch",
            "get_record_root_has_no_original_url",
            get_record_root_has_no_original_url(factory).await,
        ),
        CheckOutcome::new(
            "fetch",
            "get_record_nonexistent",
            get_record_nonexistent(factory).await,
        ),
        CheckOutcome::new(
            "fetch",
            "get_record_is_repeatable",
            get_record_is_repeatable(factory).await,
        ),
    ]
}

async fn get_record_returns_stored_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = s
        .get_record("req-b")
        .await
        .map_err(|e| format!("get req-b: {e}"))?;
    if record.request_id != "req-b" {
        return Err(format!("wrong request id: {}", record.request_id));
    }
    if record.input.original_url.as_deref() != Some(REQ_A_GOOD_URL) {
        return Err(format!(
            "wrong original url: {:?}",
            record.input.original_url
        ));
    }
    if record.results.good.image_bucket_id != "req-b.good.png"
        || record.results.bad.image_bucket_id != "req-b.bad.png"
    {
        return Err(format!("wrong results: {:?}", record.results));
    }
    Ok(())
}

async fn get_record_root_has_no_original_url<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = s
        .get_record("req-a")
        .await
        .map_err(|e| format!("get req-a: {e}"))?;
    match record.input.original_url {
        None => Ok(()),
        Some(url) => Err(format!("expected no original url, got {url}")),
    }
}

async fn get_record_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_record("req-999").await {
        Err(StorageError::RecordNotFound { request_id }) if request_id == "req-999" => Ok(()),
        other => Err(format!(
            "expected RecordNotFound for req-999, got {:?}",
            other
        )),
    }
}

async fn get_record_is_repeatable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .get_record("req-c")
        .await
        .map_err(|e| format!("first get: {e}"))?;
    let second = s
        .get_record("req-c")
        .await
        .map_err(|e| format!("second get: {e}"))?;
    if first != second {
        return Err(format!("reads differ: {first:?} vs {second:?}"));
    }
    Ok(())
}
