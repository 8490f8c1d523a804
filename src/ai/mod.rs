//! HTTP collaborator adapters: Whisper-style ASR, Ollama chat and a
//! WAV-returning TTS service.

pub mod asr;
pub mod capture;
pub mod llm;
pub mod tts;

use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{self, AiConfig, VadConfig};
use crate::error::ai::{AsrError, LlmError, TtsError};
use crate::media::AudioClip;
use crate::ports::ai::{
    AiFuture, AsrPort, ChatMessage, Language, LlmPort, TranscriberStream, TranscriptEvent, TtsPort,
};

pub use asr::WhisperAsr;
pub use llm::OllamaLlm;
pub use tts::HttpTts;

fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// All three collaborators over HTTP, sharing one connection pool.
pub struct HttpAiServices {
    asr: WhisperAsr,
    llm: OllamaLlm,
    tts: HttpTts,
}

impl HttpAiServices {
    pub fn new(ai: &AiConfig, vad: VadConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = http_client(timeout)?;
        Ok(Self {
            asr: WhisperAsr::new(client.clone(), ai.asr_url.clone(), vad),
            llm: OllamaLlm::new(client.clone(), ai.ollama_url.clone(), ai.ollama_model.clone()),
            tts: HttpTts::new(client, ai.tts_url.clone()),
        })
    }

    pub fn from_env() -> Result<Self, reqwest::Error> {
        Self::new(
            config::ai_config(),
            config::vad_config().clone(),
            config::timeouts().ai_http,
        )
    }
}

impl AsrPort for HttpAiServices {
    fn open_stream(
        &self,
        call_id: &str,
        language: Language,
        events: UnboundedSender<TranscriptEvent>,
    ) -> Result<Box<dyn TranscriberStream>, AsrError> {
        self.asr.open_stream(call_id, language, events)
    }
}

impl LlmPort for HttpAiServices {
    fn generate_answer(
        &self,
        conversation_id: String,
        messages: Vec<ChatMessage>,
    ) -> AiFuture<Result<String, LlmError>> {
        self.llm.generate_answer(conversation_id, messages)
    }

    fn clear_conversation(&self, conversation_id: &str) {
        self.llm.clear_conversation(conversation_id)
    }
}

impl TtsPort for HttpAiServices {
    fn synthesize(&self, text: String, language: Language) -> AiFuture<Result<AudioClip, TtsError>> {
        self.tts.synthesize(text, language)
    }
}
