//! CLI configuration file support
//!
//! Loads configuration from ~/.config/chatstream/config.toml

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chatstream_core::{ApiParams, ChatConfig, DEFAULT_ENDPOINT};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

const DEFAULT_MODEL: &str = "gpt-4o";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default settings
    #[serde(default)]
    pub default: DefaultConfig,
    /// API key settings
    #[serde(default)]
    pub api_keys: ApiKeysConfig,
    /// Extra request options forwarded verbatim (temperature, max_tokens, ...)
    #[serde(default)]
    pub options: toml::Table,
}

/// Default configuration values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Default model
    pub model: Option<String>,
    /// Chat-completion URL
    pub endpoint: Option<String>,
    /// System prompt
    pub system_prompt: Option<String>,
    /// Close aborted replies
    #[serde(default)]
    pub finalize_on_abort: bool,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    /// OpenAI-compatible API key
    pub openai: Option<String>,
}

impl CliConfig {
    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chatstream").join("config.toml"))
    }

    /// Merge flags over file values. Flags win.
    pub fn resolve(&self, cli: &Cli) -> Result<ChatConfig> {
        let Some(api_key) = cli.api_key.clone().or_else(|| self.api_keys.openai.clone()) else {
            bail!("API key not found");
        };

        let model = cli
            .model
            .clone()
            .or_else(|| self.default.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut params = ApiParams::new(api_key, model);
        if let serde_json::Value::Object(options) =
            serde_json::to_value(&self.options).context("Invalid [options] table")?
        {
            params.extra = options;
        }
        if let Some(temperature) = cli.temperature {
            params = params.with_option("temperature", temperature);
        }
        if let Some(max_tokens) = cli.max_tokens {
            params = params.with_option("max_tokens", max_tokens);
        }

        let endpoint = cli
            .endpoint
            .clone()
            .or_else(|| self.default.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(ChatConfig::new(params)
            .with_endpoint(endpoint)
            .with_finalize_on_abort(cli.finalize_on_abort || self.default.finalize_on_abort))
    }

    pub fn system_prompt<'a>(&'a self, cli: &'a Cli) -> Option<&'a str> {
        cli.system
            .as_deref()
            .or(self.default.system_prompt.as_deref())
    }
}

/// Read a JSON history file for seeding the conversation.
pub fn load_history(path: &Path) -> Result<Vec<chatstream_core::MessageInput>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid history file {}", path.display()))
}
