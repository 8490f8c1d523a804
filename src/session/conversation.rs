use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ports::ai::{ChatMessage, Language};

const DEFAULT_MAX_MESSAGES: usize = 20;

/// Chat history sent to the LLM, scoped to one call.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl Conversation {
    pub fn for_call(call_id: &str) -> Self {
        Self {
            id: format!("conv_{}", call_id),
            messages: Vec::new(),
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::assistant(text));
    }

    /// Forgets the last user turn when no answer could be produced for it.
    pub fn drop_unanswered(&mut self) {
        if matches!(self.messages.last(), Some(m) if m.role == crate::ports::ai::Role::User) {
            self.messages.pop();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn push(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(..excess);
        }
    }
}

/// One recognised caller utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub language: Language,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ai::Role;

    #[test]
    fn id_is_scoped_to_the_call() {
        assert_eq!(Conversation::for_call("abc").id(), "conv_abc");
    }

    #[test]
    fn history_is_bounded() {
        let mut conv = Conversation::for_call("c");
        for i in 0..15 {
            conv.push_user(format!("q{}", i));
            conv.push_assistant(format!("a{}", i));
        }
        assert_eq!(conv.messages().len(), DEFAULT_MAX_MESSAGES);
        assert_eq!(conv.messages()[0].content, "q5");
        assert_eq!(conv.messages().last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn unanswered_turn_is_removed() {
        let mut conv = Conversation::for_call("c");
        conv.push_user("hello");
        conv.drop_unanswered();
        assert!(conv.messages().is_empty());
        conv.push_user("q");
        conv.push_assistant("a");
        conv.drop_unanswered();
        assert_eq!(conv.messages().len(), 2);
        conv.clear();
        assert!(conv.messages().is_empty());
    }

    #[test]
    fn transcript_entry_serializes_its_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let entry = TranscriptEntry {
            text: "hi".into(),
            language: Language::En,
            at,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["at"], "2024-05-01T12:30:00Z");
        assert_eq!(json["text"], "hi");
    }
}
