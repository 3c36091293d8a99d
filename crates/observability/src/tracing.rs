//! Tracing/logging initialization.
//!
//! JSON lines on stdout. The filter directive comes from `RUST_LOG`, then
//! `LOG_LEVEL` (a bare level such as `debug`), then `info`.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok().as_deref(),
        std::env::var("LOG_LEVEL").ok().as_deref(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("invalid log filter {directive:?} ({err}); using {DEFAULT_DIRECTIVE}");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}

/// First non-blank of `rust_log`, `log_level`, else `info`.
pub fn filter_directive(rust_log: Option<&str>, log_level: Option<&str>) -> String {
    match (non_blank(rust_log), non_blank(log_level)) {
        (Some(directive), _) => directive.to_string(),
        (None, Some(level)) => level.to_ascii_lowercase(),
        (None, None) => DEFAULT_DIRECTIVE.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
