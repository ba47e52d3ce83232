use rgpl_sync::ForceSyncOutcome;
use serde_json::json;

use super::status::print_status;
use crate::context::AppContext;
use crate::print_json;

pub(crate) fn cmd_force_sync(ctx: &AppContext) {
    let coordinator = ctx.coordinator();
    match ctx.block_on(coordinator.force_sync()) {
        // The notifier has already shown the server message.
        ForceSyncOutcome::Synced { message, status } => {
            if ctx.is_json() {
                print_json(&json!({ "message": message, "status": status }));
            } else {
                print_status(ctx, &status);
            }
        }
        ForceSyncOutcome::Failed(reason) => ctx.fail(&format!("force sync failed: {}", reason)),
    }
}
