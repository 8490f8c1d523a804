//! Audio formats, fixed 20ms framing and conversion between wire and model rates.

pub mod converter;
pub mod resample;

pub use converter::AudioConverter;

use serde::Serialize;

pub const WIRE_SAMPLE_RATE: u32 = 8_000;
pub const MODEL_SAMPLE_RATE: u32 = 16_000;
pub const FRAME_DURATION_MS: u64 = 20;
/// Samples (and μ-law bytes) per 20ms frame at 8kHz.
pub const WIRE_FRAME_SAMPLES: usize = 160;
/// Samples per 20ms frame at 16kHz.
pub const MODEL_FRAME_SAMPLES: usize = 320;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioFormat {
    /// G.711 μ-law at 8kHz, one byte per sample.
    Mulaw8k,
    /// Linear 16-bit PCM at 8kHz.
    Pcm8k,
    /// Linear 16-bit PCM at 16kHz.
    Pcm16k,
}

/// Audio handed back by the TTS collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioClip {
    Mulaw8k(Vec<u8>),
    Pcm8k(Vec<i16>),
    Pcm16k(Vec<i16>),
}

impl AudioClip {
    pub fn format(&self) -> AudioFormat {
        match self {
            Self::Mulaw8k(_) => AudioFormat::Mulaw8k,
            Self::Pcm8k(_) => AudioFormat::Pcm8k,
            Self::Pcm16k(_) => AudioFormat::Pcm16k,
        }
    }

    pub fn sample_count(&self) -> usize {
        match self {
            Self::Mulaw8k(b) => b.len(),
            Self::Pcm8k(s) | Self::Pcm16k(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }
}

/// Splits encoded audio into 160-byte frames, padding the last one with `silence`.
pub fn chunk_wire_frames(encoded: &[u8], silence: u8) -> Vec<Vec<u8>> {
    encoded
        .chunks(WIRE_FRAME_SAMPLES)
        .map(|chunk| {
            let mut frame = chunk.to_vec();
            frame.resize(WIRE_FRAME_SAMPLES, silence);
            frame
        })
        .collect()
}

/// Mean absolute sample value; the energy measure used for IVR and silence checks.
pub fn mean_abs(pcm: &[i16]) -> f64 {
    if pcm.is_empty() {
        return 0.0;
    }
    let sum: u64 = pcm.iter().map(|&s| (s as i32).unsigned_abs() as u64).sum();
    sum as f64 / pcm.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_frame_is_padded_with_silence() {
        let frames = chunk_wire_frames(&[0x10; 400], 0xFF);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == WIRE_FRAME_SAMPLES));
        assert_eq!(frames[2][79], 0x10);
        assert!(frames[2][80..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn exact_multiple_is_not_padded() {
        let frames = chunk_wire_frames(&[0x20; 320], 0xD5);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].iter().all(|&b| b == 0x20));
        assert!(chunk_wire_frames(&[], 0xFF).is_empty());
    }

    #[test]
    fn mean_abs_handles_extremes() {
        assert_eq!(mean_abs(&[]), 0.0);
        assert_eq!(mean_abs(&[i16::MIN, i16::MAX]), 32767.5);
        assert_eq!(mean_abs(&[-300, 300]), 300.0);
    }
}
