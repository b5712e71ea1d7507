use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Where the active log filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    RustLog,
    AppConfig,
}

/// Build the filter: `RUST_LOG` wins when it parses, otherwise the configured level.
pub fn resolve_filter(config: &TelemetryConfig) -> Result<(EnvFilter, FilterSource), TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok((filter, FilterSource::RustLog));
    }

    EnvFilter::try_new(&config.log_level)
        .map(|filter| (filter, FilterSource::AppConfig))
        .map_err(|source| TelemetryError::EnvFilter {
            value: config.log_level.clone(),
            source,
        })
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let (env_filter, source) = resolve_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)?;

    tracing::debug!(?source, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_reports_the_offending_value() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "estate_desk=verbose".to_string(),
        };
        match resolve_filter(&config) {
            Err(TelemetryError::EnvFilter { value, .. }) => assert_eq!(value, "estate_desk=verbose"),
            other => panic!("expected filter error, got {other:?}"),
        }
    }

    #[test]
    fn configured_level_is_used_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
        };
        let (_, source) = resolve_filter(&config).expect("filter builds");
        assert_eq!(source, FilterSource::AppConfig);
    }
}
