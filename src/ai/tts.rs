use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use log::debug;
use reqwest::Client;
use serde::Serialize;

use crate::error::ai::TtsError;
use crate::media::{AudioClip, MODEL_SAMPLE_RATE, WIRE_SAMPLE_RATE};
use crate::ports::ai::{AiFuture, Language, TtsPort};

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// TTS service that answers with a mono 16-bit WAV body.
#[derive(Clone)]
pub struct HttpTts {
    client: Client,
    url: String,
}

impl HttpTts {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl TtsPort for HttpTts {
    fn synthesize(&self, text: String, language: Language) -> AiFuture<Result<AudioClip, TtsError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let req = TtsRequest {
                text: &text,
                language: language.code(),
            };
            let resp = client.post(&url).json(&req).send().await.map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else {
                    TtsError::SynthesisFailed(e.to_string())
                }
            })?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(TtsError::SynthesisFailed(format!("{} - {}", status, body)));
            }
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| TtsError::SynthesisFailed(e.to_string()))?;
            let clip = decode_wav(&bytes)?;
            debug!(
                "[tts] synthesized {} samples ({:?}) for {} chars",
                clip.sample_count(),
                clip.format(),
                text.chars().count()
            );
            Ok(clip)
        })
    }
}

pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip, TtsError> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| TtsError::UnsupportedAudio(e.to_string()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(TtsError::UnsupportedAudio(format!(
            "{} ch / {} bit",
            spec.channels, spec.bits_per_sample
        )));
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TtsError::UnsupportedAudio(e.to_string()))?;
    match spec.sample_rate {
        WIRE_SAMPLE_RATE => Ok(AudioClip::Pcm8k(samples)),
        MODEL_SAMPLE_RATE => Ok(AudioClip::Pcm16k(samples)),
        other => Err(TtsError::UnsupportedAudio(format!("{} Hz", other))),
    }
}
