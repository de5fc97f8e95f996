//! Merging deltas into the pending message
//!
//! All functions are pure: they take the current value and return a new one.
//! `now` is passed in as epoch milliseconds so callers control the clock.

use crate::conversation::Conversation;
use crate::models::{ChatMessage, Delta, MessageChunk, MessageMeta};

const MILLISECONDS_PER_SECOND: f64 = 1000.0;
const RESPONSE_TIME_SUFFIX: &str = " sec.";

/// Append `delta` to `message`.
///
/// Both `content` and `role` are concatenated, and the delta is logged in
/// `meta.chunks`. The timestamp stays `0` until finalization.
pub fn apply_delta(message: &ChatMessage, delta: &Delta, now: i64) -> ChatMessage {
    let mut chunks = message.meta.chunks.clone();
    chunks.push(MessageChunk {
        content: delta.content.clone(),
        role: delta.role.clone(),
        timestamp: now,
    });

    ChatMessage {
        content: format!("{}{}", message.content, delta.content),
        role: format!("{}{}", message.role, delta.role),
        timestamp: 0,
        meta: MessageMeta {
            loading: message.meta.loading,
            response_time: message.meta.response_time.clone(),
            chunks,
        },
    }
}

/// Apply `delta` to the last entry only.
pub fn apply_to_conversation(conversation: &Conversation, delta: &Delta, now: i64) -> Conversation {
    conversation.replace_last(|last| apply_delta(last, delta, now))
}

/// Close the last entry: stamp completion time, clear `loading`, record elapsed time.
pub fn finalize(conversation: &Conversation, started_at: i64, now: i64) -> Conversation {
    let response_time = format_response_time(now - started_at);
    conversation.replace_last(|last| ChatMessage {
        timestamp: now,
        meta: MessageMeta {
            loading: false,
            response_time: response_time.clone(),
            chunks: last.meta.chunks.clone(),
        },
        ..last.clone()
    })
}

/// `1234` ms becomes `"1.23 sec."`.
pub fn format_response_time(elapsed_ms: i64) -> String {
    let seconds = elapsed_ms as f64 / MILLISECONDS_PER_SECOND;
    format!("{seconds:.2}{RESPONSE_TIME_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageInput;

    fn streaming_conversation() -> Conversation {
        Conversation::from_messages([
            ChatMessage::from_input(MessageInput::user("hi"), 10),
            ChatMessage::placeholder(),
        ])
    }

    #[test]
    fn test_apply_delta_concatenates_and_logs() {
        let placeholder = ChatMessage::placeholder();
        let first = apply_delta(&placeholder, &Delta::new("", "assistant"), 100);
        let second = apply_delta(&first, &Delta::new("Hello", ""), 200);

        assert_eq!(second.content, "Hello");
        assert_eq!(second.role, "assistant");
        assert_eq!(second.timestamp, 0);
        assert!(second.meta.loading);
        assert_eq!(
            second.meta.chunks,
            vec![
                MessageChunk {
                    content: String::new(),
                    role: "assistant".to_string(),
                    timestamp: 100,
                },
                MessageChunk {
                    content: "Hello".to_string(),
                    role: String::new(),
                    timestamp: 200,
                },
            ]
        );

        // Inputs are untouched
        assert!(placeholder.meta.chunks.is_empty());
        assert_eq!(first.meta.chunks.len(), 1);
    }

    #[test]
    fn test_role_is_concatenated_not_replaced() {
        let msg = apply_delta(&ChatMessage::placeholder(), &Delta::new("", "assistant"), 1);
        let msg = apply_delta(&msg, &Delta::new("", "assistant"), 2);
        assert_eq!(msg.role, "assistantassistant");
    }

    #[test]
    fn test_apply_to_conversation_only_touches_last() {
        let conversation = streaming_conversation();
        let updated = apply_to_conversation(&conversation, &Delta::new("yo", ""), 5);

        assert_eq!(updated.get(0), conversation.get(0));
        assert!(conversation.shares_entry(&updated, 0));
        assert_eq!(updated.last().unwrap().content, "yo");
        assert_eq!(conversation.last().unwrap().content, "");
        assert!(updated.loading_invariant_holds());
    }

    #[test]
    fn test_chunks_concatenate_to_content() {
        let mut conversation = streaming_conversation();
        for (i, piece) in ["The ", "quick ", "fox"].iter().enumerate() {
            conversation = apply_to_conversation(&conversation, &Delta::new(*piece, ""), i as i64);
        }
        let last = conversation.last().unwrap();
        let joined: String = last.meta.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(joined, last.content);
        assert_eq!(last.meta.chunks.len(), 3);
    }

    #[test]
    fn test_finalize_sets_timestamp_and_response_time() {
        let conversation =
            apply_to_conversation(&streaming_conversation(), &Delta::new("done", "assistant"), 50);
        let finalized = finalize(&conversation, 1_000, 2_234);
        let last = finalized.last().unwrap();

        assert_eq!(last.timestamp, 2_234);
        assert!(!last.meta.loading);
        assert_eq!(last.meta.response_time, "1.23 sec.");
        assert_eq!(last.content, "done");
        assert_eq!(last.meta.chunks.len(), 1);
        assert!(finalized.pending().is_none());
        assert!(finalized.loading_invariant_holds());
    }

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(0), "0.00 sec.");
        assert_eq!(format_response_time(1_500), "1.50 sec.");
        assert_eq!(format_response_time(12_346), "12.35 sec.");
    }
}
