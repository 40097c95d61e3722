//! Logging setup for the dbexport binary.

use crate::Result;

/// Parses a log level name, ASCII-case-insensitively.
///
/// Accepts `error`, `warn`, `info`, `debug` and `trace`.
pub fn parse_level(name: &str) -> Option<tracing::Level> {
    match name.to_ascii_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

/// Initializes the fmt subscriber at the given maximum level.
///
/// # Errors
/// Returns a configuration error if a global subscriber is already set.
///
/// # Example
/// ```rust,no_run
/// use dbexport_core::logging::init_logging;
///
/// init_logging(tracing::Level::DEBUG).expect("Failed to initialize logging");
/// ```
pub fn init_logging(level: tracing::Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::ExportError::configuration(format!(
                "Failed to initialize logging: {}",
                e
            ))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global subscriber can only be set once per test process, so only
    // level parsing is exercised here.

    #[test]
    fn test_parse_level() {
        let test_cases = [
            ("error", Some(tracing::Level::ERROR)),
            ("WARN", Some(tracing::Level::WARN)),
            ("Info", Some(tracing::Level::INFO)),
            ("debug", Some(tracing::Level::DEBUG)),
            ("TRACE", Some(tracing::Level::TRACE)),
            ("verbose", None),
            ("", None),
        ];

        for (name, expected) in test_cases {
            assert_eq!(parse_level(name), expected, "Failed for {:?}", name);
        }
    }
}
