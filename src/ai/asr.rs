use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, info, warn};
use reqwest::{multipart, Client};
use serde::Deserialize;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender, UnboundedSender};
use tokio::task::JoinHandle;

use crate::ai::capture::UtteranceCapture;
use crate::config::VadConfig;
use crate::error::ai::AsrError;
use crate::media::MODEL_SAMPLE_RATE;
use crate::ports::ai::{AsrPort, Language, Transcript, TranscriberStream, TranscriptEvent};

/// Utterances waiting for upload. Beyond this the newest one is dropped.
const UTTERANCE_QUEUE: usize = 4;

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Whisper-style HTTP transcription: utterances are cut locally and uploaded
/// as 16kHz mono WAV.
#[derive(Clone)]
pub struct WhisperAsr {
    client: Client,
    url: String,
    vad: VadConfig,
}

impl WhisperAsr {
    pub fn new(client: Client, url: impl Into<String>, vad: VadConfig) -> Self {
        Self {
            client,
            url: url.into(),
            vad,
        }
    }
}

impl AsrPort for WhisperAsr {
    fn open_stream(
        &self,
        call_id: &str,
        language: Language,
        events: UnboundedSender<TranscriptEvent>,
    ) -> Result<Box<dyn TranscriberStream>, AsrError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            warn!("[asr] no runtime to run uploads on: {}", e);
            AsrError::ServiceUnavailable
        })?;
        let (utterance_tx, utterance_rx) = mpsc::channel(UTTERANCE_QUEUE);
        let upload = runtime.spawn(upload_loop(
            self.client.clone(),
            self.url.clone(),
            call_id.to_string(),
            language,
            utterance_rx,
            events,
        ));
        Ok(Box::new(WhisperStream {
            call_id: call_id.to_string(),
            capture: UtteranceCapture::new(self.vad.clone(), MODEL_SAMPLE_RATE),
            utterances: Some(utterance_tx),
            upload: Some(upload),
        }))
    }
}

struct WhisperStream {
    call_id: String,
    capture: UtteranceCapture,
    utterances: Option<Sender<Vec<i16>>>,
    upload: Option<JoinHandle<()>>,
}

impl TranscriberStream for WhisperStream {
    fn feed(&mut self, pcm16k: &[i16]) {
        let Some(tx) = self.utterances.as_ref() else {
            return;
        };
        let Some(utterance) = self.capture.ingest(pcm16k) else {
            return;
        };
        match tx.try_send(utterance) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => warn!(
                "[asr {}] upload queue full, dropped {} samples",
                self.call_id,
                dropped.len()
            ),
            Err(TrySendError::Closed(_)) => {
                debug!("[asr {}] upload loop gone", self.call_id);
                self.utterances = None;
            }
        }
    }

    /// Stops the stream. An upload still in flight is cancelled.
    fn close(&mut self) {
        self.capture.reset();
        self.utterances = None;
        if let Some(upload) = self.upload.take() {
            upload.abort();
        }
    }
}

impl Drop for WhisperStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Uploads utterances one at a time so transcripts arrive in speaking order.
async fn upload_loop(
    client: Client,
    url: String,
    call_id: String,
    language: Language,
    mut utterances: Receiver<Vec<i16>>,
    events: UnboundedSender<TranscriptEvent>,
) {
    while let Some(pcm) = utterances.recv().await {
        let event = match transcribe(&client, &url, &pcm, language).await {
            Ok(Some(transcript)) => {
                info!("[asr {}] transcript ({}): {}", call_id, transcript.language, transcript.text);
                Ok(transcript)
            }
            Ok(None) => {
                debug!("[asr {}] empty transcript ignored", call_id);
                continue;
            }
            Err(e) => {
                warn!("[asr {}] transcription failed: {}", call_id, e);
                Err(e)
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
    debug!("[asr {}] upload loop finished", call_id);
}

async fn transcribe(
    client: &Client,
    url: &str,
    pcm: &[i16],
    language: Language,
) -> Result<Option<Transcript>, AsrError> {
    let wav = encode_wav(pcm, MODEL_SAMPLE_RATE)
        .map_err(|e| AsrError::TranscriptionFailed(e.to_string()))?;
    let part = multipart::Part::bytes(wav)
        .file_name("utterance.wav")
        .mime_str("audio/wav")
        .map_err(|e| AsrError::TranscriptionFailed(e.to_string()))?;
    let form = multipart::Form::new()
        .part("file", part)
        .text("language", language.code());

    let resp = client.post(url).multipart(form).send().await.map_err(|e| {
        if e.is_timeout() {
            AsrError::Timeout
        } else {
            AsrError::ServiceUnavailable
        }
    })?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AsrError::TranscriptionFailed(format!("{} - {}", status, body)));
    }
    let body: WhisperResponse = resp
        .json()
        .await
        .map_err(|e| AsrError::TranscriptionFailed(e.to_string()))?;

    let text = body.text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let detected = body
        .language
        .as_deref()
        .and_then(|code| code.parse::<Language>().ok())
        .unwrap_or(language);
    Ok(Some(Transcript {
        text: text.to_string(),
        language: detected,
    }))
}

pub(crate) fn encode_wav(pcm: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in pcm {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
