use rgpl_sync::Notifier;
use tracing::info;

use crate::OutputFormat;

/// Shows alerts to the person at the terminal.
///
/// Text mode prints them on stdout. JSON mode keeps stdout for the command's
/// document and writes `{"alert": ...}` lines to stderr.
pub(crate) struct TerminalNotifier {
    output: OutputFormat,
    quiet: bool,
}

impl TerminalNotifier {
    pub(crate) fn new(output: OutputFormat, quiet: bool) -> Self {
        TerminalNotifier { output, quiet }
    }
}

impl Notifier for TerminalNotifier {
    fn alert(&self, message: &str) {
        info!(alert = message, "user alert");
        if self.quiet {
            return;
        }
        match self.output {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => eprintln!("{}", serde_json::json!({ "alert": message })),
        }
    }
}
