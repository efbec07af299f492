//! Runtime settings. Read from an optional TOML file, overridden by
//! `TREASURY`-prefixed environment variables, with defaults for everything.
//!
//! ```toml
//! [oracle]
//! timeout_ms = 3000
//! model = "gpt-4o"
//!
//! [ledger]
//! max_notes_len = 500
//! ```

use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};
use crate::utils::validation::MAX_NOTES_LEN;

/// Settings for the categorization oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Oracle calls running longer than this fall back to "unresolved"
    pub timeout_ms: u64,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    pub model: String,
    /// Without a key the HTTP oracle is not built
    pub api_key: Option<String>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Longest accepted closure note, in characters
    pub max_notes_len: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_notes_len: MAX_NOTES_LEN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub oracle: OracleSettings,
    pub ledger: LedgerSettings,
}

impl Settings {
    /// Load from `path` (extension optional, missing file allowed) and the
    /// environment
    pub fn load(path: &str) -> LedgerResult<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("TREASURY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        settings.try_deserialize().map_err(config_error)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(toml: &str) -> LedgerResult<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(config_error)?;

        settings.try_deserialize().map_err(config_error)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle.timeout_ms)
    }
}

fn config_error(err: config::ConfigError) -> LedgerError {
    LedgerError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.oracle_timeout(), Duration::from_secs(5));
        assert_eq!(settings.ledger.max_notes_len, 500);
        assert!(settings.oracle.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [oracle]
            timeout_ms = 1500
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        assert_eq!(settings.oracle_timeout(), Duration::from_millis(1500));
        assert_eq!(settings.oracle.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.oracle.model, "gpt-4o");
        assert_eq!(settings.ledger, LedgerSettings::default());
    }

    #[test]
    fn test_bad_toml_is_configuration_error() {
        let err = Settings::from_toml_str("[oracle]\ntimeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load("does-not-exist/treasury").unwrap();
        assert_eq!(settings.oracle.timeout_ms, 5000);
    }
}
