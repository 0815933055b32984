use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dirs;
use crate::error::{RelayError, Result};

/// A string wrapper that redacts its value in Debug and Display output.
/// Keeps the upstream API key out of logs and error messages.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value (only for HTTP headers)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// User-configurable settings for the relay server and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host address for the HTTP server (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP server (default: 11436)
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub relay: StreamConfig,
}

/// Connection settings for the upstream completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of an OpenAI-compatible API (a trailing `/v1` is tolerated)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// Environment variable consulted when `api_key` is not set
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Tuning for the chunk forwarding path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Chunks buffered between the upstream reader and a slow caller
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    11436
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    /// Resolve the API credential from the config file or the environment.
    ///
    /// A missing credential is a startup failure, never a per-request one.
    pub fn resolve_api_key(&self) -> Result<SecretString> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.expose().is_empty()) {
            return Ok(key.clone());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(SecretString::new(key)),
            _ => Err(RelayError::Config(format!(
                "{} is not defined. Set it in the environment or as upstream.api_key in {}",
                self.api_key_env,
                dirs::config_path().display()
            ))),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: UpstreamConfig::default(),
            relay: StreamConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from the default config file path.
    /// Returns default config if the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&dirs::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: RelayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the server bind address string (e.g., "127.0.0.1:11436").
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 11436);
        assert_eq!(config.upstream.model, "gpt-3.5-turbo");
        assert_eq!(config.upstream.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.relay.channel_capacity, 16);
    }

    #[test]
    fn test_bind_address() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:11436");
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
            port = 8080

            [upstream]
            base_url = "http://localhost:9000/v1"
            api_key = "sk-test"

            [relay]
            channel_capacity = 4
        "#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.base_url, "http://localhost:9000/v1");
        assert_eq!(config.upstream.model, "gpt-3.5-turbo");
        assert_eq!(config.relay.channel_capacity, 4);
        assert_eq!(
            config.upstream.api_key.as_ref().map(|k| k.expose()),
            Some("sk-test")
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = RelayConfig::default();
        config.host = "0.0.0.0".to_string();
        config.port = 9999;
        config.relay.channel_capacity = 2;
        config.save_to(&path).unwrap();

        let loaded = RelayConfig::load_from(&path).unwrap();
        assert_eq!(loaded.host, "0.0.0.0");
        assert_eq!(loaded.port, 9999);
        assert_eq!(loaded.relay.channel_capacity, 2);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RelayConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.port, 11436);
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let upstream = UpstreamConfig {
            api_key: Some(SecretString::new("sk-config")),
            api_key_env: "A3S_CRON_RELAY_TEST_UNSET_KEY".to_string(),
            ..UpstreamConfig::default()
        };
        assert_eq!(upstream.resolve_api_key().unwrap().expose(), "sk-config");
    }

    #[test]
    fn test_resolve_api_key_missing_is_config_error() {
        let upstream = UpstreamConfig {
            api_key: None,
            api_key_env: "A3S_CRON_RELAY_TEST_DEFINITELY_UNSET".to_string(),
            ..UpstreamConfig::default()
        };
        let err = upstream.resolve_api_key().unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err
            .to_string()
            .contains("A3S_CRON_RELAY_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_resolve_api_key_from_env() {
        std::env::set_var("A3S_CRON_RELAY_TEST_ENV_KEY", "sk-env");
        let upstream = UpstreamConfig {
            api_key: None,
            api_key_env: "A3S_CRON_RELAY_TEST_ENV_KEY".to_string(),
            ..UpstreamConfig::default()
        };
        assert_eq!(upstream.resolve_api_key().unwrap().expose(), "sk-env");
        std::env::remove_var("A3S_CRON_RELAY_TEST_ENV_KEY");
    }

    #[test]
    fn test_secret_string_redacts() {
        let secret = SecretString::new("sk-very-secret");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose(), "sk-very-secret");
    }

    #[test]
    fn test_serialized_config_omits_missing_key() {
        let serialized = toml::to_string_pretty(&RelayConfig::default()).unwrap();
        assert!(serialized.contains("base_url"));
        assert!(!serialized.contains("api_key ="));
    }
}
