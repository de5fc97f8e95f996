//! Transcript data model

use serde::{Deserialize, Serialize};

/// Incremental fragment extracted from one payload line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: String,
    pub role: String,
}

impl Delta {
    pub fn new(content: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: role.into(),
        }
    }
}

/// One applied delta, as recorded in [`MessageMeta::chunks`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChunk {
    pub content: String,
    pub role: String,
    pub timestamp: i64,
}

/// Streaming bookkeeping attached to every transcript entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageMeta {
    /// True only while this message is the active streaming target
    pub loading: bool,
    /// Elapsed time such as `"1.23 sec."`, set at finalization
    pub response_time: String,
    /// Every delta applied to this message, in arrival order
    pub chunks: Vec<MessageChunk>,
}

/// One transcript entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub role: String,
    /// Epoch milliseconds; `0` while the message is still streaming
    pub timestamp: i64,
    #[serde(default)]
    pub meta: MessageMeta,
}

impl ChatMessage {
    /// Normalize caller input, stamping `now` when no timestamp was given.
    ///
    /// Caller input is never a streaming target, so `meta.loading` is cleared.
    pub fn from_input(input: MessageInput, now: i64) -> Self {
        let mut meta = input.meta.unwrap_or_default();
        meta.loading = false;
        Self {
            content: input.content,
            role: input.role,
            timestamp: input.timestamp.unwrap_or(now),
            meta,
        }
    }

    /// Empty loading target appended at submission time.
    pub fn placeholder() -> Self {
        Self {
            content: String::new(),
            role: String::new(),
            timestamp: 0,
            meta: MessageMeta {
                loading: true,
                ..MessageMeta::default()
            },
        }
    }

    pub fn is_loading(&self) -> bool {
        self.meta.loading
    }

    /// Strip internal metadata for the outgoing request.
    pub fn to_request_message(&self) -> RequestMessage {
        RequestMessage {
            role: self.role.clone(),
            content: self.content.clone(),
        }
    }
}

/// Caller-supplied message for seeding or submitting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInput {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MessageMeta>,
}

impl MessageInput {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: None,
            meta: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// `{role, content}` pair sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_stamps_capture_time() {
        let msg = ChatMessage::from_input(MessageInput::user("hi"), 1_700);
        assert_eq!(msg.timestamp, 1_700);
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.role, "user");
        assert!(!msg.meta.loading);
        assert!(msg.meta.chunks.is_empty());
        assert_eq!(msg.meta.response_time, "");
    }

    #[test]
    fn test_from_input_keeps_given_timestamp_and_meta() {
        let input = MessageInput {
            timestamp: Some(42),
            meta: Some(MessageMeta {
                response_time: "0.50 sec.".to_string(),
                ..MessageMeta::default()
            }),
            ..MessageInput::assistant("done")
        };
        let msg = ChatMessage::from_input(input, 1_700);
        assert_eq!(msg.timestamp, 42);
        assert_eq!(msg.meta.response_time, "0.50 sec.");
    }

    #[test]
    fn test_from_input_clears_loading_flag() {
        let input = MessageInput {
            meta: Some(MessageMeta {
                loading: true,
                chunks: vec![MessageChunk {
                    content: "part".to_string(),
                    role: String::new(),
                    timestamp: 5,
                }],
                ..MessageMeta::default()
            }),
            ..MessageInput::assistant("part")
        };
        let msg = ChatMessage::from_input(input, 1_700);
        assert!(!msg.is_loading());
        assert_eq!(msg.meta.chunks.len(), 1);
    }

    #[test]
    fn test_placeholder_is_loading() {
        let msg = ChatMessage::placeholder();
        assert!(msg.is_loading());
        assert_eq!(msg.timestamp, 0);
        assert!(msg.content.is_empty());
        assert!(msg.role.is_empty());
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let msg = ChatMessage::placeholder();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["meta"]["responseTime"], "");
        assert_eq!(value["meta"]["loading"], true);
    }

    #[test]
    fn test_input_deserializes_without_optional_fields() {
        let input: MessageInput =
            serde_json::from_str(r#"{"role":"user","content":"hello"}"#).unwrap();
        assert_eq!(input, MessageInput::user("hello"));
    }
}
