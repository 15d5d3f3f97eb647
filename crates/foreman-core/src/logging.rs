//! Structured logging setup.
//!
//! One record per line, JSON, with timestamp, level, target, message, and
//! structured fields. Level comes from `LOG_LEVEL` (case-insensitive,
//! default `info`). Debug/info go to stdout; warn/error go to stderr.

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Environment variable that selects the log level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Initialize the process-wide subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    init_with_level(
        std::env::var(LOG_LEVEL_ENV)
            .ok()
            .as_deref()
            .map(parse_level)
            .unwrap_or(Level::INFO),
    );
}

fn init_with_level(max_level: Level) {
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    let _ = tracing_subscriber::fmt()
        .json()
        .with_max_level(max_level)
        .with_writer(writer)
        .with_target(true)
        .with_current_span(false)
        .try_init();
}

fn parse_level(value: &str) -> Level {
    match value.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
