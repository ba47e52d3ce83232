//! Conformance test suite for `QueueStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `QueueStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **Add**: key assignment, quota rejection, payload fidelity
//! - **List**: insertion order, snapshot stability, restartable iteration
//! - **Clear**: whole-collection removal, key monotonicity after clear
//! - **Concurrency**: racing adds, adds racing a clear
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty queue for each test:
//!
//! ```ignore
//! use rgpl_queue::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async { open_temp_queue().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod add;
mod clear;
mod concurrent;
mod list;

use std::fmt;
use std::future::Future;

use crate::record::{EncodedFile, PendingRecord};
use crate::QueueStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "add", "list", "clear").
    pub category: String,
    /// Test name (e.g. "add_assigns_increasing_keys").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a queue backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// queue, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: QueueStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(add::run_add_tests(&factory).await);
    results.extend(list::run_list_tests(&factory).await);
    results.extend(clear::run_clear_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_record(nom: &str, quartier: &str) -> PendingRecord {
    [("nom", nom), ("quartier", quartier)].into_iter().collect()
}

fn make_record_with_file(nom: &str, bytes: &[u8]) -> PendingRecord {
    let mut record = make_record(nom, "Akebe");
    record.insert("piece", EncodedFile::encode("piece.pdf", "application/pdf", bytes));
    record
}
