//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::{Result, SessionError};

/// Build the filter: `RUST_LOG` if set, else the configured level.
///
/// # Errors
/// Returns `SessionError::Config` if the configured directive is invalid.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| SessionError::Config(format!("invalid log level {:?}: {e}", config.level))),
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `SessionError::Config` if the filter is invalid or a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|e| SessionError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_parses() {
        let config = LoggingConfig {
            level: "loreweave_core=debug,info".into(),
            json: false,
        };
        assert!(env_filter(&config).is_ok());
    }
}
