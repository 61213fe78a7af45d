//! Logging utilities and structured logging support

use crate::config::LogLevel;

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence; without it `level` applies to every module.
/// Calling this more than once is harmless.
pub fn init(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.into());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
