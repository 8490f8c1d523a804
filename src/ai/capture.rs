use crate::config::VadConfig;
use crate::media::mean_abs;

/// Energy-based utterance segmentation over a stream of PCM frames.
///
/// Speech starts at the first loud frame; the utterance is closed after
/// `end_silence_ms` of quiet or once it reaches `max_speech_ms`. Utterances
/// with less than `min_speech_ms` of loud audio are discarded.
pub struct UtteranceCapture {
    vad: VadConfig,
    sample_rate: u32,
    buffer: Vec<i16>,
    in_speech: bool,
    speech_ms: u64,
    silence_ms: u64,
}

impl UtteranceCapture {
    pub fn new(vad: VadConfig, sample_rate: u32) -> Self {
        Self {
            vad,
            sample_rate,
            buffer: Vec::new(),
            in_speech: false,
            speech_ms: 0,
            silence_ms: 0,
        }
    }

    pub fn ingest(&mut self, pcm: &[i16]) -> Option<Vec<i16>> {
        if pcm.is_empty() {
            return None;
        }
        let frame_ms = pcm.len() as u64 * 1000 / self.sample_rate as u64;
        let loud = mean_abs(pcm) >= self.vad.energy_threshold;

        if !self.in_speech {
            if !loud {
                return None;
            }
            self.in_speech = true;
        }

        self.buffer.extend_from_slice(pcm);
        if loud {
            self.speech_ms += frame_ms;
            self.silence_ms = 0;
        } else {
            self.silence_ms += frame_ms;
        }

        let total_ms = self.speech_ms + self.silence_ms;
        if self.silence_ms >= self.vad.end_silence_ms || total_ms >= self.vad.max_speech_ms {
            return self.take();
        }
        None
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_speech = false;
        self.speech_ms = 0;
        self.silence_ms = 0;
    }

    fn take(&mut self) -> Option<Vec<i16>> {
        let long_enough = self.speech_ms >= self.vad.min_speech_ms;
        let utterance = std::mem::take(&mut self.buffer);
        self.reset();
        long_enough.then_some(utterance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vad() -> VadConfig {
        VadConfig {
            energy_threshold: 500.0,
            end_silence_ms: 100,
            min_speech_ms: 60,
            max_speech_ms: 1_000,
        }
    }

    const LOUD: [i16; 320] = [2000; 320];
    const QUIET: [i16; 320] = [0; 320];

    #[test]
    fn silence_alone_yields_nothing() {
        let mut cap = UtteranceCapture::new(vad(), 16_000);
        for _ in 0..20 {
            assert!(cap.ingest(&QUIET).is_none());
        }
    }

    #[test]
    fn utterance_closes_after_trailing_silence() {
        let mut cap = UtteranceCapture::new(vad(), 16_000);
        for _ in 0..5 {
            assert!(cap.ingest(&LOUD).is_none());
        }
        for _ in 0..4 {
            assert!(cap.ingest(&QUIET).is_none());
        }
        let utterance = cap.ingest(&QUIET).expect("closed by silence");
        assert_eq!(utterance.len(), 10 * 320);
    }

    #[test]
    fn short_blips_are_discarded() {
        let mut cap = UtteranceCapture::new(vad(), 16_000);
        cap.ingest(&LOUD);
        for _ in 0..4 {
            cap.ingest(&QUIET);
        }
        assert!(cap.ingest(&QUIET).is_none());
        // the next loud frame starts a fresh utterance
        assert!(cap.ingest(&LOUD).is_none());
    }

    #[test]
    fn long_speech_is_cut_at_max_length() {
        let mut cap = UtteranceCapture::new(vad(), 16_000);
        let mut emitted = None;
        for i in 0..60 {
            if let Some(u) = cap.ingest(&LOUD) {
                emitted = Some((i, u.len()));
                break;
            }
        }
        assert_eq!(emitted, Some((49, 50 * 320)));
    }
}
