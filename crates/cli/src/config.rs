//! Configuration loading from toolchat.toml.

use mcp::ProviderConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `backend.model`.
pub const MODEL_ENV: &str = "TOOLCHAT_MODEL";

/// Top-level configuration. Every field has a default, so an absent file is valid.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub provider: ProviderSection,
    pub chat: ChatConfig,
}

/// Chat completion service settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub model: String,

    /// Name of the environment variable holding the API key.
    /// The key itself is never read from the file.
    pub api_key_env: String,

    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: runtime::DEFAULT_BASE_URL.to_string(),
            model: runtime::DEFAULT_MODEL.to_string(),
            api_key_env: runtime::API_KEY_ENV.to_string(),
            timeout_secs: 60,
            max_tokens: None,
        }
    }
}

/// How to launch the tool provider.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub interpreter: String,
    pub entry_point: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            interpreter: "python".to_string(),
            entry_point: PathBuf::from("./scrape_mcp_server.py"),
            args: Vec::new(),
            env: HashMap::new(),
            handshake_timeout_secs: mcp::DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
            request_timeout_secs: mcp::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: runtime::DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(model) = var(MODEL_ENV).filter(|m| !m.is_empty()) {
            self.backend.model = model;
        }
    }

    /// Read the chat service credential through `var`.
    ///
    /// Absent or empty is a fatal configuration error.
    pub fn credential(&self, var: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
        let name = &self.backend.api_key_env;
        runtime::OpenAiBackend::api_key_from(name, var)
            .map_err(|_| ConfigError::MissingCredential(name.clone()))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Launch settings for the tool provider.
    pub fn provider_config(&self) -> ProviderConfig {
        let section = &self.provider;
        let mut config = ProviderConfig::new(&section.interpreter, &section.entry_point)
            .with_handshake_timeout(Duration::from_secs(section.handshake_timeout_secs))
            .with_request_timeout(Duration::from_secs(section.request_timeout_secs));
        config.args = section.args.clone();
        config.env = section.env.clone();
        config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("chat service credential not configured: set {0}")]
    MissingCredential(String),
}
