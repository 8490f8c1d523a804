use crate::error::MediaError;
use crate::media::resample::{downsample_clip, Downsampler2x, Upsampler2x};
use crate::media::AudioClip;
use crate::rtp::codec::Codec;

/// Bridges wire audio (G.711 at 8kHz) and model audio (PCM16 at 16kHz).
///
/// One converter belongs to one call; each direction keeps its own resampler
/// so consecutive frames join without clicks.
pub struct AudioConverter {
    codec: Codec,
    upsampler: Upsampler2x,
    downsampler: Downsampler2x,
}

impl AudioConverter {
    pub fn new(codec: Codec) -> Result<Self, MediaError> {
        Ok(Self {
            codec,
            upsampler: Upsampler2x::new()?,
            downsampler: Downsampler2x::new()?,
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Inbound payload bytes -> PCM16 at 16kHz.
    pub fn to_model_rate(&mut self, payload: &[u8]) -> Vec<i16> {
        let pcm = self.codec.decode(payload);
        self.pcm_to_model_rate(&pcm)
    }

    /// Already decoded 8kHz PCM -> 16kHz.
    pub fn pcm_to_model_rate(&mut self, pcm8k: &[i16]) -> Vec<i16> {
        self.upsampler.process(pcm8k)
    }

    /// PCM16 at 16kHz -> outbound payload bytes.
    pub fn to_wire_rate(&mut self, pcm16k: &[i16]) -> Vec<u8> {
        let pcm = self.downsampler.process(pcm16k);
        self.codec.encode(&pcm)
    }
}

/// Encodes a whole synthesized clip for the wire. Each clip is converted on
/// its own, with the resampler delay trimmed off.
pub fn clip_to_wire(clip: &AudioClip, codec: Codec) -> Result<Vec<u8>, MediaError> {
    Ok(match clip {
        AudioClip::Mulaw8k(bytes) => codec.from_mulaw(bytes),
        AudioClip::Pcm8k(pcm) => codec.encode(pcm),
        AudioClip::Pcm16k(pcm) => codec.encode(&downsample_clip(pcm)?),
    })
}
