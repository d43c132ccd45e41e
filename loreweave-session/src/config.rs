//! Session configuration.
//!
//! Wraps the engine tuning with the settings only a running session needs:
//! where the narration service lives and how to log.

use std::time::Duration;

use loreweave_core::EngineConfig;
use loreweave_stream::HttpNarrationTransport;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Top-level session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Narration service.
    #[serde(default)]
    pub narration: NarrationServiceConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `SessionError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// Where to reach the narration service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationServiceConfig {
    /// Service root; the stream endpoint is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl NarrationServiceConfig {
    /// The timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// HTTP transport for this service.
    #[must_use]
    pub fn transport(&self) -> HttpNarrationTransport {
        HttpNarrationTransport::new(self.base_url.clone(), self.timeout())
    }
}

impl Default for NarrationServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

/// Log output settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `loreweave_core=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_to_empty_file() {
        let config = SessionConfig::from_toml("").expect("empty config");
        assert_eq!(config.narration.base_url, "http://localhost:3000");
        assert_eq!(config.narration.timeout(), None);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.combat.clear_delay_ms, 2000);
    }

    #[test]
    fn nested_engine_overrides() {
        let config = SessionConfig::from_toml(
            r#"
            [engine.quests]
            progress_xp = 15

            [narration]
            base_url = "https://narrator.example"
            timeout_secs = 90

            [logging]
            json = true
            "#,
        )
        .expect("valid config");
        assert_eq!(config.engine.quests.progress_xp, 15);
        assert_eq!(config.narration.timeout(), Some(Duration::from_secs(90)));
        assert!(config.logging.json);
        assert_eq!(
            config.narration.transport().endpoint(),
            "https://narrator.example/api/stream-narrative"
        );
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[logging]\nlevel = \"debug\"").expect("write");
        let config = SessionConfig::from_file(file.path()).expect("config");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            SessionConfig::from_toml("logging = 3"),
            Err(SessionError::Config(_))
        ));
    }
}
