use crate::error::ai::LlmError;

use super::{AiFuture, ChatMessage};

pub trait LlmPort: Send + Sync {
    /// `messages` is the conversation so far, ending with the new user turn.
    fn generate_answer(
        &self,
        conversation_id: String,
        messages: Vec<ChatMessage>,
    ) -> AiFuture<Result<String, LlmError>>;

    /// Releases any history the collaborator keeps for `conversation_id`.
    fn clear_conversation(&self, _conversation_id: &str) {}
}
