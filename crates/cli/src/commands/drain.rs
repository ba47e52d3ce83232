use rgpl_sync::DrainOutcome;
use serde_json::json;

use crate::context::AppContext;
use crate::print_json;

pub(crate) fn cmd_drain(ctx: &AppContext) {
    let coordinator = ctx.coordinator();
    let outcome = ctx.block_on(coordinator.drain());
    let report = outcome.report();

    if ctx.is_json() {
        print_json(&json!({ "report": report, "error": outcome.error() }));
    } else {
        ctx.say(&format!(
            "attempted {}, delivered {}, failed {}, cleared {}",
            report.attempted.len(),
            report.delivered,
            report.failed,
            report.cleared
        ));
    }

    if let DrainOutcome::CompletedWithError { error, .. } = &outcome {
        ctx.fail(&format!("drain incomplete: {}", error));
    }
}
