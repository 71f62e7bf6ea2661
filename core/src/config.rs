//! Layered configuration
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `litmus.toml` in the working directory, `LITMUS_CONFIG_PATH`, or an
//!    explicit path from the builder
//! 3. `LITMUS_<SECTION>__<KEY>` environment variables
//!
//! CLI flags are applied on top by the caller. A `.env` file is loaded into
//! the process environment first, so it feeds both layer 3 and the
//! execution-context snapshots.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::formatter::FormatOptions;

pub const DEFAULT_CONFIG_FILE: &str = "litmus.toml";
pub const CONFIG_PATH_ENV: &str = "LITMUS_CONFIG_PATH";
const ENV_PREFIX: &str = "LITMUS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub format: FormatOptions,
    pub execution: ExecutionSettings,
    pub sdk: SdkSettings,
    pub profiles: HashMap<String, ContextProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Per-fragment deadline; 0 disables it
    pub timeout_ms: u64,
    pub default_context: String,
    /// Added to a line's indentation for its annotations
    pub indent: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            default_context: "default".to_string(),
            indent: "  ".to_string(),
        }
    }
}

impl ExecutionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl SdkSettings {
    /// Both an endpoint and a key are needed to reach the real client
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.api_url) && present(&self.api_key)
    }
}

/// Environment snapshot selected with `context=<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextProfile {
    /// Variable names copied from the process environment; a trailing `*`
    /// matches by prefix
    pub include: Vec<String>,
    /// Fixed values, applied after `include`
    pub set: BTreeMap<String, String>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Profile by name; the default profile is empty unless configured
    pub fn profile(&self, name: &str) -> Option<&ContextProfile> {
        self.profiles.get(name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.format.preview_items == 0 {
            return Err(ConfigError::Invalid(
                "format.preview_items must be at least 1".to_string(),
            ));
        }
        if self.execution.indent.chars().any(|c| !c.is_whitespace()) {
            return Err(ConfigError::Invalid(
                "execution.indent must only contain whitespace".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    load_dotenv: bool,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Load `.env` from the working directory before reading the environment
    pub fn dotenv(mut self, enabled: bool) -> Self {
        self.load_dotenv = enabled;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if self.load_dotenv {
            match dotenvy::dotenv() {
                Ok(path) => debug!(path = %path.display(), "loaded .env"),
                Err(e) if e.not_found() => {}
                Err(e) => debug!(error = %e, "ignoring unreadable .env"),
            }
        }

        let mut builder = ::config::Config::builder();

        let (path, required) = match self.config_path {
            Some(path) => (path, true),
            None => match std::env::var(CONFIG_PATH_ENV) {
                Ok(path) if !path.is_empty() => (PathBuf::from(path), true),
                _ => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };
        if required && !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        debug!(path = %path.display(), required, "reading config file");
        builder = builder.add_source(
            ::config::File::from(Path::new(&path))
                .format(::config::FileFormat::Toml)
                .required(required),
        );

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.format.max_string_length, 60);
        assert!(config.format.compact);
        assert_eq!(config.format.preview_items, 3);
        assert_eq!(config.execution.timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(config.execution.default_context, "default");
        assert!(!config.sdk.has_credentials());
    }

    #[test]
    fn test_file_values_and_profiles() {
        let file = write_config(
            r#"
            [format]
            max_string_length = 20

            [execution]
            timeout_ms = 0

            [profiles.staging]
            include = ["API_*", "HOME"]
            set = { REGION = "eu" }
            "#,
        );
        let config = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .unwrap();

        assert_eq!(config.format.max_string_length, 20);
        assert_eq!(config.format.preview_items, 3);
        assert_eq!(config.execution.timeout(), None);
        let staging = config.profile("staging").unwrap();
        assert_eq!(staging.include, vec!["API_*".to_string(), "HOME".to_string()]);
        assert_eq!(staging.set.get("REGION").map(String::as_str), Some("eu"));
        assert!(config.profile("missing").is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .config_path(Some(PathBuf::from("/definitely/not/here/litmus.toml")))
            .build();
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = write_config("[format]\npreview_items = 0\n");
        let result = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
