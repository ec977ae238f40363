//! Structured logging setup for modelrig
//!
//! Initialization and configuration for structured logging using the
//! `tracing` ecosystem. Supports pretty console output (default) or JSON,
//! runtime configuration via environment variables, and respects `RUST_LOG`
//! when set. Thread-safe, can only be initialized once.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to display
    pub level: Level,

    /// Use JSON output format (for structured logging in production)
    pub use_json: bool,

    /// Include the module target (e.g., modelrig::hardware) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }
}

/// Parses a log level from a string, defaulting to INFO on bad input
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Initializes the logging system with the provided configuration.
/// Subsequent calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();

        if env::var("RUST_LOG").is_err() {
            filter = filter.add_directive(format!("modelrig={}", config.level).parse().unwrap());
        }

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    });
}

/// Initializes logging from environment variables
///
/// Reads `MODELRIG_LOG_LEVEL` (trace, debug, info, warn, error) and
/// `MODELRIG_LOG_JSON` (true/false); `RUST_LOG` overrides filtering when set.
pub fn init_from_env() {
    let level_str = env::var("MODELRIG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let level = parse_level(&level_str);

    let use_json = env::var("MODELRIG_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    let config = LoggingConfig {
        level,
        use_json,
        ..Default::default()
    };

    init_logging(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
    }

    #[test]
    fn test_parse_level_invalid() {
        // Invalid levels default to INFO
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
        assert!(config.include_target);
        assert!(!config.include_location);
    }

    #[test]
    fn test_with_level() {
        let config = LoggingConfig::with_level(Level::DEBUG);
        assert_eq!(config.level, Level::DEBUG);
        assert!(!config.use_json);
    }
}
