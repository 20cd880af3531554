// ABOUTME: tracing subscriber setup for the sandexec binary
// ABOUTME: RUST_LOG wins; otherwise verbosity picks between info and warn. Logs go to stderr.

use tracing_subscriber::EnvFilter;

/// Filter directive used when RUST_LOG is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

pub fn build_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    rust_log
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(verbose: bool) {
    let rust_log = std::env::var(sandexec_config::constants::RUST_LOG).ok();
    let filter = build_filter(rust_log.as_deref(), verbose);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
