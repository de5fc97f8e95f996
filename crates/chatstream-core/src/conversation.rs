//! Copy-on-write transcript
//!
//! Every update returns a new [`Conversation`]. Entries that did not change are
//! shared with the previous value, so observers can compare snapshots with
//! [`Conversation::ptr_eq`] instead of walking the messages.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::models::ChatMessage;

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Arc<Vec<Arc<ChatMessage>>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        Self {
            messages: Arc::new(messages.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index).map(Deref::deref)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last().map(Deref::deref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().map(Deref::deref)
    }

    /// The loading tail message, if a response is being streamed into it.
    pub fn pending(&self) -> Option<&ChatMessage> {
        self.last().filter(|msg| msg.is_loading())
    }

    /// True when both values are the same snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }

    /// True when entry `index` is shared between both snapshots.
    pub fn shares_entry(&self, other: &Self, index: usize) -> bool {
        match (self.messages.get(index), other.messages.get(index)) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }

    pub fn extend(&self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut next = Vec::clone(&self.messages);
        next.extend(messages.into_iter().map(Arc::new));
        Self {
            messages: Arc::new(next),
        }
    }

    pub fn push(&self, message: ChatMessage) -> Self {
        self.extend(std::iter::once(message))
    }

    /// Replace the last entry with `f(last)`. Empty conversations are returned unchanged.
    pub fn replace_last(&self, f: impl FnOnce(&ChatMessage) -> ChatMessage) -> Self {
        let Some(last) = self.messages.last() else {
            return self.clone();
        };
        let replacement = Arc::new(f(last));
        let mut next = Vec::clone(&self.messages);
        if let Some(slot) = next.last_mut() {
            *slot = replacement;
        }
        Self {
            messages: Arc::new(next),
        }
    }

    pub fn to_vec(&self) -> Vec<ChatMessage> {
        self.iter().cloned().collect()
    }

    /// At most one loading entry, and only in last position.
    pub fn loading_invariant_holds(&self) -> bool {
        let count = self.iter().filter(|msg| msg.is_loading()).count();
        count == 0 || (count == 1 && self.pending().is_some())
    }
}

impl PartialEq for Conversation {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.iter().eq(other.iter())
    }
}

impl Serialize for Conversation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageInput;

    fn message(content: &str) -> ChatMessage {
        ChatMessage::from_input(MessageInput::user(content), 1)
    }

    #[test]
    fn test_push_leaves_original_untouched() {
        let first = Conversation::from_messages([message("a")]);
        let second = first.push(message("b"));
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert!(!first.ptr_eq(&second));
        assert!(first.shares_entry(&second, 0));
    }

    #[test]
    fn test_replace_last_shares_prefix() {
        let conversation = Conversation::from_messages([message("a"), message("b")]);
        let updated = conversation.replace_last(|msg| ChatMessage {
            content: format!("{}!", msg.content),
            ..msg.clone()
        });
        assert_eq!(updated.last().unwrap().content, "b!");
        assert_eq!(conversation.last().unwrap().content, "b");
        assert!(conversation.shares_entry(&updated, 0));
        assert!(!conversation.shares_entry(&updated, 1));
    }

    #[test]
    fn test_replace_last_on_empty_is_noop() {
        let empty = Conversation::new();
        let same = empty.replace_last(|_| message("x"));
        assert!(same.is_empty());
        assert!(empty.ptr_eq(&same));
    }

    #[test]
    fn test_pending_only_reports_loading_tail() {
        let idle = Conversation::from_messages([message("a")]);
        assert!(idle.pending().is_none());

        let streaming = idle.push(ChatMessage::placeholder());
        assert!(streaming.pending().is_some());
        assert!(streaming.loading_invariant_holds());
    }

    #[test]
    fn test_invariant_detects_loading_in_middle() {
        let broken = Conversation::from_messages([ChatMessage::placeholder(), message("a")]);
        assert!(!broken.loading_invariant_holds());

        let twice = Conversation::from_messages([
            ChatMessage::placeholder(),
            ChatMessage::placeholder(),
        ]);
        assert!(!twice.loading_invariant_holds());
    }

    #[test]
    fn test_serializes_as_array() {
        let conversation = Conversation::from_messages([message("a")]);
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value[0]["content"], "a");
    }
}
