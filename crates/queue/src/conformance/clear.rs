use std::future::Future;

use super::{make_record, TestResult};
use crate::QueueStore;

pub(super) async fn run_clear_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "clear",
            "clear_empties_queue",
            clear_empties_queue(factory).await,
        ),
        TestResult::from_result(
            "clear",
            "clear_on_empty_queue_is_ok",
            clear_on_empty_queue_is_ok(factory).await,
        ),
        TestResult::from_result(
            "clear",
            "keys_keep_increasing_after_clear",
            keys_keep_increasing_after_clear(factory).await,
        ),
        TestResult::from_result(
            "clear",
            "snapshot_survives_clear",
            snapshot_survives_clear(factory).await,
        ),
    ]
}

async fn clear_empties_queue<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    for n in ["A", "B", "C"] {
        q.add(&make_record(n, "Nord"))
            .await
            .map_err(|e| e.to_string())?;
    }
    let removed = q.clear_all().await.map_err(|e| e.to_string())?;
    if removed != 3 {
        return Err(format!("expected 3 removed, got {removed}"));
    }
    let n = q.len().await.map_err(|e| e.to_string())?;
    if n != 0 {
        return Err(format!("expected empty queue, got {n}"));
    }
    Ok(())
}

async fn clear_on_empty_queue_is_ok<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let removed = q.clear_all().await.map_err(|e| e.to_string())?;
    if removed != 0 {
        return Err(format!("expected 0 removed, got {removed}"));
    }
    Ok(())
}

/// The local key generator is not reset by a clear.
async fn keys_keep_increasing_after_clear<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let before = q
        .add(&make_record("A", "Nord"))
        .await
        .map_err(|e| e.to_string())?;
    q.clear_all().await.map_err(|e| e.to_string())?;
    let after = q
        .add(&make_record("B", "Nord"))
        .await
        .map_err(|e| e.to_string())?;
    if after <= before {
        return Err(format!("key {after} reused or reset (before clear: {before})"));
    }
    Ok(())
}

/// A snapshot read before a clear still yields its records.
async fn snapshot_survives_clear<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    q.add(&make_record("A", "Nord"))
        .await
        .map_err(|e| e.to_string())?;
    let snap = q.list_all().await.map_err(|e| e.to_string())?;
    q.clear_all().await.map_err(|e| e.to_string())?;
    let records = snap.into_records().map_err(|e| e.to_string())?;
    if records.len() != 1 {
        return Err(format!("expected 1 record in snapshot, got {}", records.len()));
    }
    Ok(())
}
