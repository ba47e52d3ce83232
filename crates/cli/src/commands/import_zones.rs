use std::path::Path;

use rgpl_sync::ZoneImportOutcome;

use crate::context::AppContext;
use crate::print_json;

pub(crate) fn cmd_import_zones(ctx: &AppContext, file: Option<&Path>) {
    let coordinator = ctx.coordinator();
    match ctx.block_on(coordinator.import_zones(file)) {
        ZoneImportOutcome::Imported(import) => {
            if ctx.is_json() {
                match serde_json::to_value(&import) {
                    Ok(value) => print_json(&value),
                    Err(e) => ctx.fail(&format!("could not serialize zones: {}", e)),
                }
            } else {
                ctx.say(&format!("{} zone(s) imported", import.zones.len()));
            }
        }
        ZoneImportOutcome::NoFile => match file {
            Some(path) => ctx.fail(&format!("no zone file at '{}'", path.display())),
            None => ctx.fail("no zone file given"),
        },
        ZoneImportOutcome::Failed(reason) => ctx.fail(&format!("zone import failed: {}", reason)),
    }
}
