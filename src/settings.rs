//! Configuration management for Torq.
//!
//! Settings are loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `torq.toml` file
//! 3. User config `~/.config/torq/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_MAX_PARALLELISM: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_SERVER_PORT: u16 = 5000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Test execution configuration.
    pub execution: ExecutionSettings,

    /// Ingress server configuration.
    pub server: ServerSettings,

    /// LLM provider configuration for test generation.
    pub llm: LlmSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            execution: ExecutionSettings::default(),
            server: ServerSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from default locations.
    ///
    /// Searches in order:
    /// 1. `./torq.toml` (project local)
    /// 2. `~/.config/torq/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, SettingsError> {
        if Path::new("torq.toml").exists() {
            return Self::from_file("torq.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("torq").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut settings = Self::default();
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let mut settings: Settings = toml::from_str(&content)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(secs) = std::env::var("TORQ_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(n) = secs.parse() {
                self.execution.request_timeout_seconds = n;
            }
        }
        if let Ok(workers) = std::env::var("TORQ_MAX_PARALLELISM") {
            if let Ok(n) = workers.parse() {
                self.execution.max_parallelism = n;
            }
        }
        if let Ok(retries) = std::env::var("TORQ_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.execution.max_retries = n;
            }
        }
        if let Ok(delay) = std::env::var("TORQ_RETRY_DELAY_MS") {
            if let Ok(n) = delay.parse() {
                self.execution.retry_delay_ms = n;
            }
        }
        if let Ok(flag) = std::env::var("TORQ_ALLOW_UNTRUSTED_SSL") {
            if let Ok(b) = flag.parse() {
                self.execution.allow_untrusted_ssl = b;
            }
        }
        if let Ok(dir) = std::env::var("TORQ_UPLOAD_DIR") {
            self.server.upload_dir = dir;
        }
        if let Ok(key) = std::env::var("TORQ_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("TORQ_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("TORQ_LLM_MODEL") {
            self.llm.model = Some(model);
        }
    }
}

/// Test execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Per-HTTP-request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Number of workers executing tests within a dependency layer.
    pub max_parallelism: usize,

    /// Additional attempts after the first failed one.
    pub max_retries: u32,

    /// Sleep between retry attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Disable TLS certificate validation (explicit opt-in).
    pub allow_untrusted_ssl: bool,

    /// Upper bound on recorded response body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            allow_untrusted_ssl: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ExecutionSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Ingress server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port to listen on.
    pub port: u16,

    /// Directory where uploaded OpenAPI files are stored.
    pub upload_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            upload_dir: DEFAULT_UPLOAD_DIR.to_string(),
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider name: "openai" or "openai-compatible".
    pub provider: String,

    /// Base URL for the chat completions API.
    pub base_url: Option<String>,

    /// API key (can also be set via TORQ_LLM_API_KEY or OPENAI_API_KEY).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model name.
    pub model: Option<String>,

    /// Maximum tokens for the generation response.
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: None,
            api_key: None,
            model: None,
            max_tokens: 8192,
        }
    }
}

impl LlmSettings {
    /// Get the API key from config or environment.
    pub fn api_key_or_env(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("TORQ_LLM_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(
            settings.execution.request_timeout_seconds,
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        );
        assert_eq!(settings.execution.max_parallelism, DEFAULT_MAX_PARALLELISM);
        assert_eq!(settings.execution.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(settings.server.upload_dir, DEFAULT_UPLOAD_DIR);
    }

    #[test]
    fn test_settings_from_toml() {
        let toml_str = r#"
[execution]
request_timeout_seconds = 10
max_parallelism = 8
max_retries = 2

[server]
port = 8080
upload_dir = "/tmp/specs"

[llm]
model = "gpt-4o"
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.execution.request_timeout_seconds, 10);
        assert_eq!(settings.execution.max_parallelism, 8);
        assert_eq!(settings.execution.max_retries, 2);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.upload_dir, "/tmp/specs");
        assert_eq!(settings.llm.model, Some("gpt-4o".to_string()));
    }

    #[test]
    fn test_settings_to_toml() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("[execution]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[llm]"));
    }

    #[test]
    fn test_durations() {
        let exec = ExecutionSettings::default();
        assert_eq!(exec.request_timeout(), Duration::from_secs(30));
        assert_eq!(exec.retry_delay(), Duration::from_millis(1000));
    }
}
