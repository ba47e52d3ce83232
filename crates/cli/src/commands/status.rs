use rgpl_sync::{ConnectionMonitor, ConnectionState, RenderedStatus, SyncApi};

use crate::context::AppContext;
use crate::print_json;

pub(crate) fn cmd_status(ctx: &AppContext) {
    let status = ctx.block_on(async {
        let api = ctx.api();
        let state = if api.probe().await {
            ConnectionState::Online
        } else {
            ConnectionState::Offline
        };
        let coordinator = ctx.coordinator_with(ctx.queue(), ConnectionMonitor::new(state));
        coordinator.refresh_status().await
    });
    print_status(ctx, &status);
}

pub(crate) fn print_status(ctx: &AppContext, status: &RenderedStatus) {
    if ctx.is_json() {
        match serde_json::to_value(status) {
            Ok(value) => print_json(&value),
            Err(e) => ctx.fail(&format!("could not serialize status: {}", e)),
        }
    } else if !ctx.quiet {
        print!("{}", status);
    }
}
