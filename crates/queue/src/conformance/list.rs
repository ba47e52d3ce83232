use std::future::Future;

use super::{make_record, TestResult};
use crate::QueueStore;

pub(super) async fn run_list_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "list",
            "empty_queue_lists_nothing",
            empty_queue_lists_nothing(factory).await,
        ),
        TestResult::from_result(
            "list",
            "list_is_in_insertion_order",
            list_is_in_insertion_order(factory).await,
        ),
        TestResult::from_result(
            "list",
            "snapshot_ignores_later_adds",
            snapshot_ignores_later_adds(factory).await,
        ),
        TestResult::from_result(
            "list",
            "snapshot_iteration_restarts",
            snapshot_iteration_restarts(factory).await,
        ),
        TestResult::from_result(
            "list",
            "list_does_not_consume",
            list_does_not_consume(factory).await,
        ),
    ]
}

async fn empty_queue_lists_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let snap = q.list_all().await.map_err(|e| e.to_string())?;
    if !snap.is_empty() {
        return Err(format!("expected empty snapshot, got {} rows", snap.len()));
    }
    Ok(())
}

async fn list_is_in_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let names = ["Nguema", "Mba", "Obame", "Ondo"];
    for n in names {
        q.add(&make_record(n, "Akebe"))
            .await
            .map_err(|e| e.to_string())?;
    }
    let records = q
        .list_all()
        .await
        .map_err(|e| e.to_string())?
        .into_records()
        .map_err(|e| e.to_string())?;
    let got: Vec<&str> = records
        .iter()
        .filter_map(|(_, r)| r.text("nom"))
        .collect();
    if got != names {
        return Err(format!("expected {names:?}, got {got:?}"));
    }
    Ok(())
}

/// A snapshot taken before an add does not grow afterward.
async fn snapshot_ignores_later_adds<S, F, Fut>(factory: &F) -> Result<(), String>
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
    q.add(&make_record("B", "Nord"))
        .await
        .map_err(|e| e.to_string())?;
    if snap.len() != 1 || snap.iter().count() != 1 {
        return Err(format!("snapshot changed after add: {} rows", snap.len()));
    }
    Ok(())
}

async fn snapshot_iteration_restarts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    for n in ["A", "B", "C"] {
        q.add(&make_record(n, "Sud"))
            .await
            .map_err(|e| e.to_string())?;
    }
    let snap = q.list_all().await.map_err(|e| e.to_string())?;
    let first = snap.iter().take(2).count();
    let full = snap.iter().count();
    if first != 2 || full != 3 {
        return Err(format!("partial pass {first}, full pass {full}"));
    }
    Ok(())
}

async fn list_does_not_consume<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    q.add(&make_record("A", "Nord"))
        .await
        .map_err(|e| e.to_string())?;
    q.list_all().await.map_err(|e| e.to_string())?;
    let again = q.list_all().await.map_err(|e| e.to_string())?;
    if again.len() != 1 {
        return Err(format!("second read saw {} rows", again.len()));
    }
    Ok(())
}
