//! Console logging setup for binaries built on logscout.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Parses a configured level name; unknown names fall back to `warn`
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "info" => LevelFilter::INFO,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::WARN,
    }
}

/// Installs a stderr subscriber filtered at `level`.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Installing twice is a
/// no-op, so tests and embedding binaries can call this freely.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(level).into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
