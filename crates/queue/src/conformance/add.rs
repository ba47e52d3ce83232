use std::future::Future;

use super::{make_record, make_record_with_file, TestResult};
use crate::record::FieldValue;
use crate::QueueStore;

pub(super) async fn run_add_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "add",
            "add_assigns_increasing_keys",
            add_assigns_increasing_keys(factory).await,
        ),
        TestResult::from_result(
            "add",
            "add_makes_record_visible",
            add_makes_record_visible(factory).await,
        ),
        TestResult::from_result(
            "add",
            "scalar_values_are_byte_identical",
            scalar_values_are_byte_identical(factory).await,
        ),
        TestResult::from_result(
            "add",
            "file_values_decode_to_original_bytes",
            file_values_decode_to_original_bytes(factory).await,
        ),
        TestResult::from_result(
            "add",
            "duplicate_records_get_distinct_keys",
            duplicate_records_get_distinct_keys(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

/// Keys handed out by successive adds strictly increase.
async fn add_assigns_increasing_keys<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let mut last = None;
    for i in 0..5 {
        let key = q
            .add(&make_record(&format!("Famille {i}"), "Nord"))
            .await
            .map_err(|e| e.to_string())?;
        if let Some(prev) = last {
            if key <= prev {
                return Err(format!("key {key} not greater than previous {prev}"));
            }
        }
        last = Some(key);
    }
    Ok(())
}

async fn add_makes_record_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let key = q
        .add(&make_record("Dupont", "Nord"))
        .await
        .map_err(|e| e.to_string())?;
    let snap = q.list_all().await.map_err(|e| e.to_string())?;
    if snap.keys() != vec![key] {
        return Err(format!("expected only key {key}, got {:?}", snap.keys()));
    }
    let n = q.len().await.map_err(|e| e.to_string())?;
    if n != 1 {
        return Err(format!("expected len 1, got {n}"));
    }
    Ok(())
}

/// A text value read back through `list_all` is identical to what was added,
/// including non-ASCII text.
async fn scalar_values_are_byte_identical<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let nom = "Famille Nguéma \"l'aînée\" 🏠\n";
    q.add(&make_record(nom, "Nzeng-Ayong"))
        .await
        .map_err(|e| e.to_string())?;
    let records = q
        .list_all()
        .await
        .map_err(|e| e.to_string())?
        .into_records()
        .map_err(|e| e.to_string())?;
    let got = records
        .first()
        .and_then(|(_, r)| r.text("nom"))
        .unwrap_or_default();
    if got.as_bytes() != nom.as_bytes() {
        return Err(format!("expected {nom:?}, got {got:?}"));
    }
    Ok(())
}

async fn file_values_decode_to_original_bytes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let bytes: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    q.add(&make_record_with_file("Mba", &bytes))
        .await
        .map_err(|e| e.to_string())?;
    let records = q
        .list_all()
        .await
        .map_err(|e| e.to_string())?
        .into_records()
        .map_err(|e| e.to_string())?;
    let file = match records.first().and_then(|(_, r)| r.get("piece")) {
        Some(FieldValue::File(f)) => f.clone(),
        other => return Err(format!("expected file field, got {other:?}")),
    };
    if file.name != "piece.pdf" || file.mime != "application/pdf" {
        return Err(format!("file metadata changed: {} / {}", file.name, file.mime));
    }
    let decoded = file.decode().map_err(|e| e.to_string())?;
    if decoded != bytes {
        return Err("decoded bytes differ from original".to_string());
    }
    Ok(())
}

/// No deduplication: the same record added twice is queued twice.
async fn duplicate_records_get_distinct_keys<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let q = factory().await;
    let record = make_record("Dupont", "Nord");
    let a = q.add(&record).await.map_err(|e| e.to_string())?;
    let b = q.add(&record).await.map_err(|e| e.to_string())?;
    if a == b {
        return Err(format!("both adds returned key {a}"));
    }
    let n = q.len().await.map_err(|e| e.to_string())?;
    if n != 2 {
        return Err(format!("expected 2 queued records, got {n}"));
    }
    Ok(())
}
