//! Subscriber setup. Logs go to stderr; stdout carries command output.

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogSection};

const DEFAULT_FILTER: &str = "info";

/// Filter directives: `RGPL_LOG` (already folded into `log.filter`), else `info`.
pub(crate) fn filter_directives(log: &LogSection) -> &str {
    log.filter.as_deref().unwrap_or(DEFAULT_FILTER)
}

/// Install the global subscriber. Later calls are ignored.
pub(crate) fn init_logging(log: &LogSection, quiet: bool) {
    let env_filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_new(filter_directives(log)).unwrap_or_else(|e| {
            eprintln!("invalid log filter, using '{DEFAULT_FILTER}': {e}");
            EnvFilter::new(DEFAULT_FILTER)
        })
    };

    // One branch per format: each fmt layer has its own type.
    let result = match log.format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(io::stderr).compact())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(io::stderr).pretty())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("logging already initialised: {e}");
    }
}
