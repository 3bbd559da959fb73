//! Console logging bootstrap using the tracing ecosystem.
//!
//! Designed for containerized deployments where logs go to stdout and the
//! level is driven by the environment:
//!
//! - `RUST_LOG` controls the filter (default `info`).
//! - `CONDUCTOR_LOG_FORMAT=json` switches to structured JSON output.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; subsequent calls are no-ops. Tests call
/// this freely without worrying about double-initialization panics.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("CONDUCTOR_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stdout()))
            .try_init()
    };

    // Another subscriber may already be installed (e.g. by a test harness).
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
