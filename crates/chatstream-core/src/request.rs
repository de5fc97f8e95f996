//! Outgoing chat-completion request

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::models::RequestMessage;

/// Caller configuration for the completion endpoint.
///
/// `apiKey` and `model` are pulled out; every other option (temperature,
/// max tokens, ...) is forwarded verbatim in the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiParams {
    #[serde(rename = "apiKey", alias = "api_key", default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiParams {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            extra: Map::new(),
        }
    }

    /// Add a passthrough option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Build `{model, ...extra, messages, stream: true}`.
///
/// Later keys win, so a passthrough `messages` or `stream` option can never
/// override the real ones.
pub fn build_request_body(params: &ApiParams, messages: &[RequestMessage]) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(params.model.clone()));
    body.extend(params.extra.clone());
    body.insert(
        "messages".to_string(),
        Value::Array(
            messages
                .iter()
                .map(|m| json!({ "role": m.role, "content": m.content }))
                .collect(),
        ),
    );
    body.insert("stream".to_string(), Value::Bool(true));
    Value::Object(body)
}

/// Fully built request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub endpoint: String,
    pub api_key: String,
    pub body: Value,
}

impl ChatRequest {
    pub fn new(endpoint: impl Into<String>, params: &ApiParams, messages: &[RequestMessage]) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: params.api_key.clone(),
            body: build_request_body(params, messages),
        }
    }

    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            ("Content-Type", "application/json".to_string()),
            ("Authorization", format!("Bearer {}", self.api_key)),
        ]
    }

    /// Messages carried in the body, for diagnostics and tests.
    pub fn messages(&self) -> Vec<RequestMessage> {
        self.body
            .get("messages")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }
}
