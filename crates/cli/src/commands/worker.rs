//! `rgpl worker`: the background context.
//!
//! Resumes the cache, installs and activates the configured snapshot when it
//! is not already active, then probes the server and drains the queue each
//! time it comes back. Runs until interrupted unless `--once` is given.

use std::sync::Arc;

use rgpl_sync::{ConnectionMonitor, ConnectionState};
use rgpl_worker::{
    BackgroundWorker, CacheState, ConnectivityWatcher, EventOutcome, WorkerEvent, WorkerHandle,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::context::AppContext;

pub(crate) fn cmd_worker(ctx: &AppContext, once: bool, sync_now: bool) {
    if let Err(e) = ctx.block_on(run_worker(ctx, once, sync_now)) {
        ctx.fail(&e);
    }
}

async fn run_worker(ctx: &AppContext, once: bool, sync_now: bool) -> Result<(), String> {
    // Offline until the first probe answers, so that probe drains the queue.
    let monitor = ConnectionMonitor::new(ConnectionState::Offline);
    let coordinator = Arc::new(ctx.coordinator_with(ctx.queue(), monitor.clone()));
    let cache = Arc::new(ctx.cache_manager());
    let state = cache
        .resume()
        .await
        .map_err(|e| format!("could not read the cache: {}", e))?;
    info!(%state, "cache resumed");

    let (worker, handle) = BackgroundWorker::new(Arc::clone(&cache), coordinator);
    let running = tokio::spawn(worker.run());

    let manifest = ctx.config.manifest();
    if state == CacheState::Active(manifest.version.clone()) {
        ctx.say(&format!("cache {} already active", manifest.version));
    } else {
        settle(ctx, &handle, WorkerEvent::Install(manifest)).await?;
        settle(ctx, &handle, WorkerEvent::Activate).await?;
    }
    if sync_now {
        settle(ctx, &handle, WorkerEvent::sync_pending()).await?;
    }

    if !once {
        let watcher = ConnectivityWatcher::new(
            ctx.api(),
            monitor,
            handle.clone(),
            ctx.config.probe_interval(),
        );
        ctx.say(&format!(
            "watching {} every {}s, Ctrl-C to stop",
            ctx.config.server_url, ctx.config.worker.probe_interval_secs
        ));
        tokio::select! {
            result = watcher.run() => result.map_err(|e| e.to_string())?,
            _ = tokio::signal::ctrl_c() => info!("interrupted"),
        }
    }

    drop(handle);
    if let Err(e) = running.await {
        error!(error = %e, "background worker task failed");
    }
    Ok(())
}

/// Dispatch one event and wait for it to settle. A failed event is fatal.
async fn settle(
    ctx: &AppContext,
    handle: &WorkerHandle,
    event: WorkerEvent,
) -> Result<EventOutcome, String> {
    let name = event.name();
    let ticket = handle.dispatch(event).await.map_err(|e| e.to_string())?;
    let outcome = ticket.wait().await;
    show_outcome(ctx, name, &outcome);
    match outcome {
        EventOutcome::Failed(reason) => Err(format!("{} failed: {}", name, reason)),
        other => Ok(other),
    }
}

fn show_outcome(ctx: &AppContext, name: &str, outcome: &EventOutcome) {
    if ctx.is_json() {
        if !ctx.quiet {
            println!("{}", json!({ "event": name, "outcome": outcome_json(outcome) }));
        }
        return;
    }
    match outcome {
        EventOutcome::Installed(report) => ctx.say(&format!(
            "installed {}: {} cached, {} skipped",
            report.version,
            report.cached.len(),
            report.failed.len()
        )),
        EventOutcome::Activated(report) => {
            ctx.say(&format!(
                "activated {}, deleted {} old snapshot(s)",
                report.version,
                report.deleted.len()
            ));
            for (name, reason) in &report.retained {
                ctx.say(&format!("  kept old snapshot {}: {}", name, reason));
            }
        }
        EventOutcome::Drained(drained) => {
            let report = drained.report();
            ctx.say(&format!(
                "synced: delivered {}, failed {}, cleared {}",
                report.delivered, report.failed, report.cleared
            ));
            if let Some(e) = drained.error() {
                ctx.say(&format!("sync incomplete: {}", e));
            }
        }
        EventOutcome::Ignored { tag } => ctx.say(&format!("ignored sync tag '{}'", tag)),
        EventOutcome::Fetch(_) | EventOutcome::Failed(_) => {}
    }
}

fn outcome_json(outcome: &EventOutcome) -> Value {
    match outcome {
        EventOutcome::Installed(report) => json!({ "installed": report }),
        EventOutcome::Activated(report) => json!({ "activated": report }),
        EventOutcome::Fetch(_) => json!({ "fetch": "network" }),
        EventOutcome::Drained(drained) => json!({
            "drained": drained.report(),
            "error": drained.error(),
        }),
        EventOutcome::Ignored { tag } => json!({ "ignored": tag }),
        EventOutcome::Failed(reason) => json!({ "failed": reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgpl_sync::{DrainOutcome, DrainReport};

    #[test]
    fn drained_outcome_carries_error() {
        let outcome = EventOutcome::Drained(DrainOutcome::CompletedWithError {
            report: DrainReport::default(),
            error: "disk gone".to_string(),
        });
        let value = outcome_json(&outcome);
        assert_eq!(value["error"], "disk gone");
        assert_eq!(value["drained"]["delivered"], 0);
    }

    #[test]
    fn failed_outcome() {
        let value = outcome_json(&EventOutcome::Failed("boom".to_string()));
        assert_eq!(value, json!({ "failed": "boom" }));
    }
}
