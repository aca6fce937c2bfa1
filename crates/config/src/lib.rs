//! Configuration loading, validation, and management for Murmur.
//!
//! Loads configuration from `~/.murmur/config.toml` with environment
//! variable overrides. Validates all settings at startup. Also owns the
//! system-prompt assembly: identity and format instructions live in plain
//! text files so behaviour can be tweaked without touching code.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.murmur/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Context window configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// System prompt configuration
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend", &self.backend)
            .field("context", &self.context)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("prompt", &self.prompt)
            .finish()
    }
}

/// Which completion backend to call and how.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend kind: "ollama" (default) or "openai"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the backend; defaults per provider when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (only required for hosted providers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per reply (None = backend default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// How much history goes into each model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Raw log window included verbatim, in minutes
    #[serde(default = "default_recent_window_minutes")]
    pub recent_window_minutes: u64,

    /// Maximum number of summaries included
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,
}

fn default_recent_window_minutes() -> u64 {
    15
}
fn default_summary_limit() -> usize {
    30
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_window_minutes: default_recent_window_minutes(),
            summary_limit: default_summary_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; "sqlite::memory:" for an ephemeral log
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    AppConfig::config_dir()
        .join("murmur.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8471
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Sources for the system prompt, assembled by [`AppConfig::system_prompt`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    /// Identity and behaviour instructions (rarely change)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_path: Option<PathBuf>,

    /// Response format instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_path: Option<PathBuf>,

    /// Runtime override, normally populated from the SYSTEM_PROMPT env var
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_text: Option<String>,
}

/// Fallback when no prompt sources are configured at all.
const DEFAULT_SYSTEM_PROMPT: &str = "You are Murmur, a home assistant that reads events, \
cleans them up and explains what is going on in clear English.";

impl AppConfig {
    /// Load configuration from the default path (~/.murmur/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `MURMUR_PROVIDER` — backend kind
    /// - `MURMUR_MODEL` — model name
    /// - `OLLAMA_HOST` — backend base URL
    /// - `OPENAI_API_KEY` — API key
    /// - `SYSTEM_PROMPT` — system prompt override text
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(provider) = std::env::var("MURMUR_PROVIDER") {
            config.backend.provider = provider;
        }

        if let Ok(model) = std::env::var("MURMUR_MODEL") {
            config.backend.model = model;
        }

        if config.backend.base_url.is_none() {
            config.backend.base_url = std::env::var("OLLAMA_HOST").ok();
        }

        if config.backend.api_key.is_none() {
            config.backend.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if config.prompt.override_text.is_none() {
            config.prompt.override_text = std::env::var("SYSTEM_PROMPT").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".murmur")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend.provider.as_str() {
            "ollama" => {}
            "openai" => {
                if self.backend.api_key.is_none() {
                    return Err(ConfigError::ValidationError(
                        "openai backend requires an api_key (or OPENAI_API_KEY)".into(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown backend provider: {other} (expected \"ollama\" or \"openai\")"
                )));
            }
        }

        if self.backend.temperature < 0.0 || self.backend.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "backend.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.recent_window_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "context.recent_window_minutes must be > 0".into(),
            ));
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Assemble the full system prompt.
    ///
    /// Joins the static prompt file, the structure prompt file, and the
    /// runtime override with blank lines, in that precedence order. Falls
    /// back to a built-in default when every source is absent. Missing or
    /// unreadable files are skipped, not fatal.
    pub fn system_prompt(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(text) = self.prompt.static_path.as_deref().and_then(read_prompt_file) {
            parts.push(text);
        }
        if let Some(text) = self
            .prompt
            .structure_path
            .as_deref()
            .and_then(read_prompt_file)
        {
            parts.push(text);
        }
        if let Some(text) = &self.prompt.override_text {
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }

        if parts.is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            parts.join("\n\n")
        }
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            context: ContextConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            prompt: PromptConfig::default(),
        }
    }
}

fn read_prompt_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let text = text.trim().to_string();
            if text.is_empty() { None } else { Some(text) }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Prompt file unreadable, skipping");
            None
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.provider, "ollama");
        assert_eq!(config.context.recent_window_minutes, 15);
        assert_eq!(config.context.summary_limit, 30);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backend.provider, config.backend.provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = AppConfig {
            backend: BackendConfig {
                provider: "anthropic".into(),
                ..BackendConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn openai_requires_api_key() {
        let mut config = AppConfig::default();
        config.backend.provider = "openai".into();
        assert!(config.validate().is_err());

        config.backend.api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_window_rejected() {
        let mut config = AppConfig::default();
        config.context.recent_window_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().backend.provider, "ollama");
    }

    #[test]
    fn system_prompt_falls_back_to_default() {
        let config = AppConfig::default();
        assert_eq!(config.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn system_prompt_joins_sources() {
        let dir = tempfile::tempdir().unwrap();
        let static_path = dir.path().join("prompt_static.txt");
        let structure_path = dir.path().join("prompt_structure.txt");
        std::fs::write(&static_path, "You are a helpful aggregator.\n").unwrap();
        std::fs::write(&structure_path, "Answer in one paragraph.").unwrap();

        let mut config = AppConfig::default();
        config.prompt.static_path = Some(static_path);
        config.prompt.structure_path = Some(structure_path);
        config.prompt.override_text = Some("Be terse.".into());

        let prompt = config.system_prompt();
        assert_eq!(
            prompt,
            "You are a helpful aggregator.\n\nAnswer in one paragraph.\n\nBe terse."
        );
    }

    #[test]
    fn system_prompt_skips_missing_files() {
        let mut config = AppConfig::default();
        config.prompt.static_path = Some(PathBuf::from("/nonexistent/prompt.txt"));
        config.prompt.override_text = Some("Only the override.".into());
        assert_eq!(config.system_prompt(), "Only the override.");
    }

    #[test]
    fn api_key_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.backend.api_key = Some("sk-secret".into());
        let dbg = format!("{:?}", config);
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("ollama"));
        assert!(toml_str.contains("recent_window_minutes"));
    }
}
