use rgpl_sync::{FileField, FormEntry, FormSubmission, SendOutcome};
use serde_json::json;

use crate::context::AppContext;
use crate::print_json;

pub(crate) fn cmd_capture(ctx: &AppContext, fields: &[String], files: &[String]) {
    let form = match build_form(fields, files) {
        Ok(form) => form,
        Err(e) => ctx.fail(&e),
    };

    let coordinator = ctx.coordinator();
    let receipt = match ctx.block_on(coordinator.capture(form)) {
        Ok(receipt) => receipt,
        Err(e) => ctx.fail(&format!("capture failed: {}", e)),
    };

    if ctx.is_json() {
        let (sent, response, send_error) = match &receipt.sent {
            SendOutcome::Delivered(body) => (true, body.clone(), None),
            SendOutcome::Failed(reason) => (false, serde_json::Value::Null, Some(reason.clone())),
        };
        print_json(&json!({
            "fields": receipt.record.len(),
            "queued": receipt.queued.as_ref().ok(),
            "queue_error": receipt.queued.as_ref().err().map(|e| e.to_string()),
            "sent": sent,
            "response": response,
            "send_error": send_error,
        }));
    } else {
        match &receipt.queued {
            Ok(key) => ctx.say(&format!("queued locally as #{}", key)),
            Err(e) => ctx.say(&format!("not queued: {}", e)),
        }
        match &receipt.sent {
            SendOutcome::Delivered(_) => ctx.say("sent to server"),
            SendOutcome::Failed(reason) => {
                ctx.say(&format!("not sent, will retry on next sync: {}", reason))
            }
        }
    }

    // Lost only when it is neither stored nor delivered.
    if let (Err(e), false) = (&receipt.queued, receipt.sent.is_delivered()) {
        ctx.fail(&format!("record was neither queued nor sent: {}", e));
    }
}

fn build_form(fields: &[String], files: &[String]) -> Result<FormSubmission, String> {
    let mut form = FormSubmission::new();
    for spec in fields {
        let (key, value) = parse_field(spec)?;
        form.push(key, FormEntry::Text(value.to_string()));
    }
    for spec in files {
        let (key, file) = parse_file(spec)?;
        form.push(key, FormEntry::File(file));
    }
    Ok(form)
}

/// `KEY=VALUE`; the value may contain `=`.
fn parse_field(spec: &str) -> Result<(&str, &str), String> {
    match spec.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(format!("invalid --field '{}': expected KEY=VALUE", spec)),
    }
}

/// `KEY=PATH[:MIME]`. An empty path is an input with no file chosen.
fn parse_file(spec: &str) -> Result<(&str, FileField), String> {
    let (key, rest) = match spec.split_once('=') {
        Some((key, rest)) if !key.is_empty() => (key, rest),
        _ => return Err(format!("invalid --file '{}': expected KEY=PATH[:MIME]", spec)),
    };
    if rest.is_empty() {
        return Ok((key, FileField::empty()));
    }
    let field = match rest.rsplit_once(':') {
        Some((path, mime)) if !path.is_empty() && looks_like_mime(mime) => {
            FileField::from_path(path).with_mime(mime)
        }
        _ => FileField::from_path(rest),
    };
    Ok((key, field))
}

fn looks_like_mime(s: &str) -> bool {
    match s.split_once('/') {
        Some((kind, sub)) => !kind.is_empty() && !sub.is_empty() && !sub.contains('/'),
        None => false,
    }
}
