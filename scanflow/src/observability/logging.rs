//! `tracing-subscriber` installation.

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{Result, ScanflowError};
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// returns a configuration error rather than panicking.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };
    installed.map_err(|e| ScanflowError::Config(format!("tracing already initialized: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| ScanflowError::Config(format!("invalid log level '{}': {e}", config.level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "scanflow=[".to_string(),
            format: LogFormat::Pretty,
        };
        assert!(build_filter(&config).is_err());
    }

    #[test]
    fn test_accepts_directives() {
        let config = LoggingConfig {
            level: "info,scanflow=debug".to_string(),
            format: LogFormat::Json,
        };
        assert!(build_filter(&config).is_ok());
    }
}
