//! Structured logging via `tracing`.
//!
//! Library code only emits events; the binary installs the subscriber.
//! `RUST_LOG` takes precedence over the level passed on the command line.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Level used when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Accepted `--log-level` values.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level)
}

/// Installs a compact stderr subscriber.
///
/// Subsequent calls are silently ignored, so tests may call this freely.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
