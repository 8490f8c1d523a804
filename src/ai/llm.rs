use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ai::LlmError;
use crate::ports::ai::{AiFuture, ChatMessage, LlmPort, Role};

const SYSTEM_PROMPT: &str = "You are a friendly telephone assistant. \
Answer in the same language the caller uses (English or Simplified Chinese). \
Keep every reply short enough to be spoken in a few seconds and never use markdown, lists or emoji.";

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize, Clone)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

/// Ollama `/api/chat` client. History travels with every request, so the
/// server keeps no per-conversation state.
#[derive(Clone)]
pub struct OllamaLlm {
    client: Client,
    url: String,
    model: String,
}

impl OllamaLlm {
    pub fn new(client: Client, url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            model: model.into(),
        }
    }
}

fn build_request(model: &str, messages: &[ChatMessage]) -> OllamaChatRequest {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(OllamaMessage {
        role: "system".to_string(),
        content: SYSTEM_PROMPT.to_string(),
    });
    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        out.push(OllamaMessage {
            role: role.to_string(),
            content: msg.content.clone(),
        });
    }
    OllamaChatRequest {
        model: model.to_string(),
        messages: out,
        stream: false,
    }
}

fn parse_answer(body: &str) -> Result<String, LlmError> {
    let parsed: OllamaChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::GenerationFailed(e.to_string()))?;
    let answer = parsed
        .message
        .map(|m| m.content.trim().to_string())
        .unwrap_or_default();
    if answer.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(answer)
}

impl LlmPort for OllamaLlm {
    fn generate_answer(
        &self,
        conversation_id: String,
        messages: Vec<ChatMessage>,
    ) -> AiFuture<Result<String, LlmError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        let req = build_request(&self.model, &messages);
        Box::pin(async move {
            let resp = client.post(&url).json(&req).send().await.map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::GenerationFailed(e.to_string())
                }
            })?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| LlmError::GenerationFailed(e.to_string()))?;
            debug!("[llm {}] ollama status={} body={}", conversation_id, status, body);
            if !status.is_success() {
                return Err(LlmError::GenerationFailed(format!("{} - {}", status, body)));
            }
            let answer = parse_answer(&body)?;
            info!("[llm {}] answer: {}", conversation_id, answer);
            Ok(answer)
        })
    }

    fn clear_conversation(&self, conversation_id: &str) {
        debug!("[llm {}] conversation cleared", conversation_id);
    }
}
