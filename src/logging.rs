//! Tracing setup driven by a small JSON logging file.
//!
//! ```json
//! { "filter": "info,recruit_bot=debug", "directory": "logs", "file_prefix": "recruit-bot", "ansi": true }
//! ```
//!
//! Every field is optional. `RUST_LOG` wins over `filter` when set.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::ConfigError;

const DEFAULT_FILTER: &str = "info";

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Directory for daily-rolling log files; stderr only when absent.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    /// Colored stderr output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            directory: None,
            file_prefix: "recruit-bot".to_string(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Load the logging file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse and validate logging settings.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ConfigError::ParseError(format!("logging config: {e}")))?;

        EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
            key: "filter".into(),
            message: e.to_string(),
        })?;

        Ok(config)
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process, otherwise
/// buffered file output is dropped.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"filter": "warn,recruit_bot=debug", "directory": "logs", "file_prefix": "bot", "ansi": false}}"#
        )
        .unwrap();

        let config = LoggingConfig::load(file.path()).unwrap();
        assert_eq!(config.filter, "warn,recruit_bot=debug");
        assert_eq!(config.directory, Some(PathBuf::from("logs")));
        assert_eq!(config.file_prefix, "bot");
        assert!(!config.ansi);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = LoggingConfig::parse(r#"{"filter": "debug"}"#).unwrap();
        assert_eq!(config.filter, "debug");
        assert_eq!(config.directory, None);
        assert_eq!(config.file_prefix, "recruit-bot");
        assert!(config.ansi);
    }

    #[test]
    fn malformed_json_rejected() {
        let err = LoggingConfig::parse("{ filter: debug").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = LoggingConfig::parse(r#"{"level": "debug"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn bad_filter_rejected() {
        let err = LoggingConfig::parse(r#"{"filter": "recruit_bot=loud"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "filter"));
    }
}
