//! Logging configuration
//!
//! Logs go to stderr so they never mix with anything piped through stdout.
//! Set `AOSD_DEBUG=1` to enable debug output for the aosd crates; a
//! `RUST_LOG` filter overrides both defaults.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn filter_directive(debug_logging: bool) -> &'static str {
    if debug_logging {
        "warn,aosd=debug,aosd_cat=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init() {
    let debug_logging = std::env::var("AOSD_DEBUG").is_ok_and(|v| !v.is_empty() && v != "0");

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(debug_logging)));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .init();

    tracing::debug!(debug_logging, "aosd_cat logging initialized");
}
