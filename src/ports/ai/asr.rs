use tokio::sync::mpsc::UnboundedSender;

use crate::error::ai::AsrError;

use super::{Language, TranscriptEvent};

/// A live transcription stream for one call.
///
/// `feed` is called from the RTP receive path with 16kHz PCM and must return
/// quickly. Completed utterances arrive on the `events` channel handed to
/// [`AsrPort::open_stream`], possibly while frames are still being fed.
pub trait TranscriberStream: Send {
    fn feed(&mut self, pcm16k: &[i16]);
    fn close(&mut self);
}

pub trait AsrPort: Send + Sync {
    fn open_stream(
        &self,
        call_id: &str,
        language: Language,
        events: UnboundedSender<TranscriptEvent>,
    ) -> Result<Box<dyn TranscriberStream>, AsrError>;
}
