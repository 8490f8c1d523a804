use crate::error::ai::TtsError;
use crate::media::AudioClip;

use super::{AiFuture, Language};

pub trait TtsPort: Send + Sync {
    fn synthesize(&self, text: String, language: Language) -> AiFuture<Result<AudioClip, TtsError>>;
}
