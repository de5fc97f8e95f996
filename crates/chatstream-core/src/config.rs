//! Session configuration

use serde::{Deserialize, Serialize};

use crate::request::ApiParams;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat-completion URL
    pub endpoint: String,
    /// `apiKey`, `model` and passthrough options
    pub params: ApiParams,
    /// Finalize the pending message on abort instead of leaving it loading.
    pub finalize_on_abort: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            params: ApiParams::default(),
            finalize_on_abort: false,
        }
    }
}

impl ChatConfig {
    pub fn new(params: ApiParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_finalize_on_abort(mut self, enabled: bool) -> Self {
        self.finalize_on_abort = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.finalize_on_abort);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: ChatConfig = serde_json::from_str(
            r#"{"params": {"apiKey": "sk", "model": "gpt-4o", "temperature": 0.1}}"#,
        )
        .unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.params.model, "gpt-4o");
        assert_eq!(config.params.extra["temperature"], 0.1);
    }
}
