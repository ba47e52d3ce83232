use std::io::Write;

use rgpl_worker::{CacheManager, CacheState, WorkerError};
use serde_json::json;

use crate::context::AppContext;
use crate::print_json;

/// A manager picked up where the last run left it.
fn resumed(ctx: &AppContext) -> CacheManager {
    let manager = ctx.cache_manager();
    if let Err(e) = ctx.block_on(manager.resume()) {
        ctx.fail(&format!("could not read the cache: {}", e));
    }
    manager
}

pub(crate) fn cmd_cache_install(ctx: &AppContext, version: Option<&str>) {
    let mut manifest = ctx.config.manifest();
    if let Some(version) = version {
        manifest.version = version.to_string();
    }

    let manager = resumed(ctx);
    let report = match ctx.block_on(manager.install(&manifest)) {
        Ok(report) => report,
        Err(e) => ctx.fail(&format!("install failed: {}", e)),
    };

    if ctx.is_json() {
        print_json(&json!(report));
        return;
    }
    ctx.say(&format!(
        "installed {}: {} cached, {} skipped",
        report.version,
        report.cached.len(),
        report.failed.len()
    ));
    for (path, reason) in &report.failed {
        ctx.say(&format!("  skipped {}: {}", path, reason));
    }
}

pub(crate) fn cmd_cache_activate(ctx: &AppContext, version: Option<&str>) {
    let version = version.unwrap_or(ctx.config.cache.version.as_str());
    let manager = resumed(ctx);

    if ctx.block_on(manager.state()) == CacheState::Active(version.to_string()) {
        if ctx.is_json() {
            print_json(&json!({ "version": version, "deleted": [], "retained": [], "claimed": 0 }));
        } else {
            ctx.say(&format!("{} is already active", version));
        }
        return;
    }

    let result = ctx.block_on(async {
        manager.adopt(version).await?;
        // No page is open in this process.
        manager.skip_waiting().await;
        manager.activate().await
    });
    let report = match result {
        Ok(report) => report,
        Err(e) => ctx.fail(&format!("activation failed: {}", e)),
    };

    if ctx.is_json() {
        print_json(&json!(report));
    } else {
        ctx.say(&format!(
            "activated {}, deleted {} old snapshot(s)",
            report.version,
            report.deleted.len()
        ));
        for (name, reason) in &report.retained {
            ctx.say(&format!("  kept old snapshot {}: {}", name, reason));
        }
    }
}

pub(crate) fn cmd_cache_list(ctx: &AppContext) {
    let manager = ctx.cache_manager();
    let store = manager.store();
    let listed = ctx.block_on(async {
        Ok::<_, WorkerError>((store.names().await?, store.active().await?))
    });
    let (names, active) = match listed {
        Ok(listed) => listed,
        Err(e) => ctx.fail(&format!("could not read the cache: {}", e)),
    };

    if ctx.is_json() {
        print_json(&json!({ "active": active, "versions": names }));
        return;
    }
    if names.is_empty() {
        ctx.say("no snapshot installed");
    }
    for name in &names {
        let marker = if active.as_deref() == Some(name.as_str()) { "*" } else { " " };
        ctx.say(&format!("{} {}", marker, name));
    }
}

pub(crate) fn cmd_cache_show(ctx: &AppContext, path: &str) {
    let manager = resumed(ctx);
    let response = match ctx.block_on(manager.cached(path)) {
        Ok(Some(response)) => response,
        Ok(None) => ctx.fail(&format!("no cached response for '{}'", path)),
        Err(e) => ctx.fail(&format!("could not read the cache: {}", e)),
    };

    if ctx.is_json() {
        print_json(&json!({
            "path": response.path,
            "status": response.status,
            "content_type": response.content_type,
            "bytes": response.body.len(),
        }));
        return;
    }
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout.write_all(&response.body).and_then(|_| stdout.flush()) {
        ctx.fail(&format!("could not write response body: {}", e));
    }
}
