//! Configuration management for AttestBridge.
//!
//! Every section has defaults so an empty file (or no file at all) yields a
//! usable configuration. Environment variables override file values.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "toml")]
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_PROVIDER: &str = "ATTESTBRIDGE_PROVIDER";
pub const ENV_DISPATCH_TIMEOUT_MS: &str = "ATTESTBRIDGE_DISPATCH_TIMEOUT_MS";
pub const ENV_CLOUD_ENDPOINT: &str = "ATTESTBRIDGE_CLOUD_ENDPOINT";
pub const ENV_CLOUD_API_KEY: &str = "ATTESTBRIDGE_CLOUD_API_KEY";
pub const ENV_LOG_JSON: &str = "ATTESTBRIDGE_LOG_JSON";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Which platform provider the service should run with.
///
/// `Auto` resolves by target OS: the foreign hardware bridge on Android,
/// the software stub everywhere else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    #[default]
    Auto,
    Hardware,
    Stub,
    Cloud,
}

impl FromStr for ProviderSelection {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "hardware" => Ok(Self::Hardware),
            "stub" | "software" => Ok(Self::Stub),
            "cloud" => Ok(Self::Cloud),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider kind '{}' (expected auto, hardware, stub or cloud)",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Hardware => "hardware",
            Self::Stub => "stub",
            Self::Cloud => "cloud",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Worker threads for the owned dispatch runtime.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Upper bound on a single provider call. Unset means wait indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignConfig {
    /// JNI class name of the companion object implementing the provider contract.
    #[serde(default = "default_companion_class")]
    pub companion_class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_cloud_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub foreign: ForeignConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_threads() -> usize {
    2
}

fn default_companion_class() -> String {
    "dev/attestbridge/AttestationCompanion".to_string()
}

fn default_cloud_request_timeout() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            timeout_ms: None,
        }
    }
}

impl Default for ForeignConfig {
    fn default() -> Self {
        Self {
            companion_class: default_companion_class(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_ms: default_cloud_request_timeout(),
            api_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise start from defaults; then apply
    /// environment overrides and validate the result.
    #[cfg(feature = "toml")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Blank values are ignored.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(kind) = lookup(ENV_PROVIDER) {
            self.provider.kind = kind.parse()?;
        }

        if let Some(timeout) = lookup(ENV_DISPATCH_TIMEOUT_MS) {
            let parsed = timeout.trim().parse::<u64>().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{} must be a whole number of milliseconds, got '{}'",
                    ENV_DISPATCH_TIMEOUT_MS, timeout
                ))
            })?;
            self.dispatch.timeout_ms = Some(parsed);
        }

        if let Some(endpoint) = lookup(ENV_CLOUD_ENDPOINT) {
            self.cloud.endpoint = Some(endpoint);
        }

        if let Some(api_key) = lookup(ENV_CLOUD_API_KEY) {
            self.cloud.api_key = Some(api_key);
        }

        if let Some(json) = lookup(ENV_LOG_JSON) {
            let lowered = json.to_ascii_lowercase();
            self.logging.json = matches!(lowered.as_str(), "1" | "true" | "yes" | "on");
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.worker_threads == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.worker_threads must be greater than 0".to_string(),
            ));
        }

        if self.dispatch.timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "dispatch.timeout_ms must be greater than 0 when set".to_string(),
            ));
        }

        if self.foreign.companion_class.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "foreign.companion_class must not be empty".to_string(),
            ));
        }

        if self.provider.kind == ProviderSelection::Cloud {
            match self.cloud.endpoint.as_deref() {
                None => {
                    return Err(ConfigError::ValidationError(
                        "provider kind 'cloud' requires cloud.endpoint".to_string(),
                    ))
                }
                Some(endpoint)
                    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") =>
                {
                    return Err(ConfigError::ValidationError(
                        "cloud.endpoint must use http:// or https:// protocol".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        if self.cloud.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cloud.request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.kind, ProviderSelection::Auto);
        assert_eq!(config.dispatch.worker_threads, 2);
        assert_eq!(config.dispatch.timeout_ms, None);
        assert_eq!(config.cloud.request_timeout_ms, 10_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [provider]
            kind = "stub"

            [dispatch]
            timeout_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.kind, ProviderSelection::Stub);
        assert_eq!(config.dispatch.timeout_ms, Some(2500));
        assert_eq!(config.dispatch.worker_threads, 2);
        assert_eq!(
            config.foreign.companion_class,
            "dev/attestbridge/AttestationCompanion"
        );
    }

    #[test]
    fn test_cloud_requires_endpoint() {
        let err = Config::from_toml_str("[provider]\nkind = \"cloud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let config = Config::from_toml_str(
            "[provider]\nkind = \"cloud\"\n[cloud]\nendpoint = \"https://integrity.example/token\"\n",
        )
        .unwrap();
        assert_eq!(config.provider.kind, ProviderSelection::Cloud);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_overrides_from(lookup_from(&[
                (ENV_PROVIDER, "software"),
                (ENV_DISPATCH_TIMEOUT_MS, "750"),
                (ENV_LOG_JSON, "yes"),
                (ENV_CLOUD_API_KEY, "   "),
            ]))
            .unwrap();

        assert_eq!(config.provider.kind, ProviderSelection::Stub);
        assert_eq!(config.dispatch.timeout_ms, Some(750));
        assert!(config.logging.json);
        assert_eq!(config.cloud.api_key, None);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let err = Config::default()
            .with_overrides_from(lookup_from(&[(ENV_PROVIDER, "quantum")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = Config::default()
            .with_overrides_from(lookup_from(&[(ENV_DISPATCH_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.dispatch.timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }
}
