//! Logging utilities for fob-plugin-driver
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: the driver emits tracing events and forwards plugin
//! logs to them by default - install your own subscriber.
//! For application developers: use these convenience functions.

use fob_emitter::LogLevel;
use std::sync::Once;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Silent => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    }
}

/// Initialize logging with the specified level
///
/// Only the first call in a process takes effect.
///
/// # Example
///
/// ```rust,no_run
/// use fob_plugin_driver::logging::init_logging;
/// use fob_plugin_driver::LogLevel;
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level_filter(level).into())
            .from_env_lossy();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}

/// Initialize logging from the RUST_LOG environment variable
///
/// Falls back to Info level if RUST_LOG is not set or invalid.
pub fn init_logging_from_env() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy()
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(LogLevel::Silent), LevelFilter::OFF);
        assert_eq!(level_filter(LogLevel::Warn), LevelFilter::WARN);
        assert_eq!(level_filter(LogLevel::default()), LevelFilter::INFO);
    }
}
