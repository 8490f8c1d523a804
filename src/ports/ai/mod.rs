use std::future::Future;
use std::pin::Pin;

pub mod asr;
pub mod llm;
pub mod tts;
pub mod types;

pub use asr::{AsrPort, TranscriberStream};
pub use llm::LlmPort;
pub use tts::TtsPort;
pub use types::{ChatMessage, Language, Role, Transcript, TranscriptEvent};

pub use crate::error::ai::{AsrError, LlmError, TtsError};

pub type AiFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Aggregate trait for bundling the collaborators one call needs.
pub trait AiServices: AsrPort + LlmPort + TtsPort {}

impl<T> AiServices for T where T: AsrPort + LlmPort + TtsPort {}
