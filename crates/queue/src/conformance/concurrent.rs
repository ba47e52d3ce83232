use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use super::{make_record, TestResult};
use crate::{QueueError, QueueStore};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_adds_all_land_with_unique_keys",
            concurrent_adds_all_land_with_unique_keys(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "adds_racing_clear_are_all_or_nothing",
            adds_racing_clear_are_all_or_nothing(factory).await,
        ),
    ]
}

// ── Concurrent adds ─────────────────────────────────────────────────────────

/// N tasks add one record each; all N are queued under N distinct keys.
async fn concurrent_adds_all_land_with_unique_keys<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let q = q.clone();
        handles.push(tokio::spawn(async move {
            q.add(&make_record(&format!("Famille {i}"), "Nord")).await
        }));
    }

    let mut keys = HashSet::new();
    for handle in handles {
        let key = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: QueueError| format!("queue error: {e}"))?;
        keys.insert(key);
    }

    if keys.len() != N {
        return Err(format!("expected {N} distinct keys, got {}", keys.len()));
    }
    let n = q.len().await.map_err(|e| e.to_string())?;
    if n != N {
        return Err(format!("expected {N} queued records, got {n}"));
    }
    Ok(())
}

// ── Adds racing a clear ─────────────────────────────────────────────────────

/// Adds and a clear run concurrently. Every add that reported success is
/// either entirely gone (cleared) or entirely readable afterward, and the
/// clear count plus survivors accounts for every add.
async fn adds_racing_clear_are_all_or_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let q = q.clone();
        handles.push(tokio::spawn(async move {
            q.add(&make_record(&format!("Famille {i}"), "Sud")).await
        }));
    }
    let clearer = {
        let q = q.clone();
        tokio::spawn(async move { q.clear_all().await })
    };

    let mut added = 0usize;
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: QueueError| format!("queue error: {e}"))?;
        added += 1;
    }
    let cleared = clearer
        .await
        .map_err(|e| format!("task panic: {e}"))?
        .map_err(|e| format!("clear error: {e}"))?;

    let survivors = q
        .list_all()
        .await
        .map_err(|e| e.to_string())?
        .into_records()
        .map_err(|e| format!("partially written record visible: {e}"))?;

    if cleared + survivors.len() != added {
        return Err(format!(
            "{added} adds but {cleared} cleared + {} surviving",
            survivors.len()
        ));
    }
    Ok(())
}
