use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("Service unavailable")]
    ServiceUnavailable,
    #[error("Timeout")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Empty response")]
    EmptyResponse,
    #[error("Timeout")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("Unsupported audio: {0}")]
    UnsupportedAudio(String),
    #[error("Timeout")]
    Timeout,
}
