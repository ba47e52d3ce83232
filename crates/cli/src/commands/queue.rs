use rgpl_queue::{FieldValue, PendingRecord};
use serde_json::json;

use crate::context::AppContext;
use crate::print_json;

pub(crate) fn cmd_queue_list(ctx: &AppContext) {
    let queue = ctx.queue();
    let snapshot = match ctx.block_on(queue.list_all()) {
        Ok(snapshot) => snapshot,
        Err(e) => ctx.fail(&format!("could not read the queue: {}", e)),
    };

    if ctx.is_json() {
        let rows: Vec<serde_json::Value> = snapshot
            .iter()
            .map(|row| match row {
                Ok((key, record)) => json!({ "key": key, "record": record }),
                Err(e) => json!({ "error": e.to_string() }),
            })
            .collect();
        print_json(&json!({ "count": snapshot.len(), "records": rows }));
        return;
    }

    if snapshot.is_empty() {
        ctx.say("queue is empty");
        return;
    }
    for row in snapshot.iter() {
        match row {
            Ok((key, record)) => ctx.say(&format!("#{}  {}", key, summarize(&record))),
            Err(e) => ctx.say(&format!("?  unreadable record: {}", e)),
        }
    }
    ctx.say(&format!("{} record(s) pending", snapshot.len()));
}

/// One line per record: text values inline, files by name and size.
fn summarize(record: &PendingRecord) -> String {
    record
        .iter()
        .map(|(key, value)| match value {
            FieldValue::Text(s) => format!("{}={}", key, s),
            FieldValue::Bool(b) => format!("{}={}", key, b),
            FieldValue::Number(n) => format!("{}={}", key, n),
            FieldValue::File(file) => match file.decode() {
                Ok(bytes) => format!("{}=<{}, {} bytes>", key, file.name, bytes.len()),
                Err(_) => format!("{}=<{}, undecodable>", key, file.name),
            },
        })
        .collect::<Vec<_>>()
        .join("  ")
}
