//! Diagnostic logging to stderr.
//!
//! User-facing progress is printed to stdout by the commands; this is only
//! for `tracing` events. `RUST_LOG` takes precedence over `--verbose`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "devlab=warn";
const VERBOSE_FILTER: &str = "devlab=debug";

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
