//! Stateful 2x up/down sampling between 8kHz and 16kHz on top of rubato.
//!
//! Each direction owns one `SincFixedIn` that always takes a whole 20ms
//! chunk (160 samples at 8kHz, 320 at 16kHz). Shorter input is held back
//! until a chunk is complete, so audio fed frame by frame comes out identical
//! to the same audio fed in one piece.

use log::warn;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::MediaError;
use crate::media::{MODEL_FRAME_SAMPLES, WIRE_FRAME_SAMPLES};

const SINC_LEN: usize = 512;
const F_CUTOFF: f32 = 0.95;
const OVERSAMPLING: usize = 128;
const SCALE: f64 = 32768.0;

fn to_i16(value: f64) -> i16 {
    (value * SCALE).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

struct ChunkedResampler {
    inner: SincFixedIn<f64>,
    chunk: usize,
    ratio: f64,
    pending: Vec<f64>,
}

impl ChunkedResampler {
    fn new(ratio: f64, chunk: usize) -> Result<Self, MediaError> {
        let params = SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: F_CUTOFF,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: OVERSAMPLING,
            window: WindowFunction::BlackmanHarris2,
        };
        let inner = SincFixedIn::<f64>::new(ratio, 1.0, params, chunk, 1)?;
        Ok(Self {
            inner,
            chunk,
            ratio,
            pending: Vec::with_capacity(chunk),
        })
    }

    fn process(&mut self, input: &[i16]) -> Vec<i16> {
        self.pending
            .extend(input.iter().map(|&s| s as f64 / SCALE));
        let mut out = Vec::with_capacity((self.pending.len() as f64 * self.ratio) as usize);
        while self.pending.len() >= self.chunk {
            let block: Vec<f64> = self.pending.drain(..self.chunk).collect();
            self.run(&block, &mut out);
        }
        out
    }

    fn run(&mut self, block: &[f64], out: &mut Vec<i16>) {
        match self.inner.process(&[block], None) {
            Ok(channels) => {
                if let Some(channel) = channels.first() {
                    out.extend(channel.iter().map(|&v| to_i16(v)));
                }
            }
            Err(e) => warn!("[media] resampler dropped a {} sample chunk: {}", block.len(), e),
        }
    }

    /// Pads the held-back samples to a chunk and pushes silence through until
    /// the filter delay has come out.
    fn flush(&mut self) -> Vec<i16> {
        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let mut block = std::mem::take(&mut self.pending);
            block.resize(self.chunk, 0.0);
            self.run(&block, &mut out);
        }
        let per_chunk = (self.chunk as f64 * self.ratio) as usize;
        let silence = vec![0.0; self.chunk];
        let mut owed = self.inner.output_delay();
        while owed > 0 {
            self.run(&silence, &mut out);
            owed = owed.saturating_sub(per_chunk);
        }
        out
    }

    fn delay(&self) -> usize {
        self.inner.output_delay()
    }
}

/// 8kHz -> 16kHz.
pub struct Upsampler2x {
    inner: ChunkedResampler,
}

impl Upsampler2x {
    pub fn new() -> Result<Self, MediaError> {
        Ok(Self {
            inner: ChunkedResampler::new(2.0, WIRE_FRAME_SAMPLES)?,
        })
    }

    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        self.inner.process(input)
    }
}

/// 16kHz -> 8kHz.
pub struct Downsampler2x {
    inner: ChunkedResampler,
}

impl Downsampler2x {
    pub fn new() -> Result<Self, MediaError> {
        Ok(Self {
            inner: ChunkedResampler::new(0.5, MODEL_FRAME_SAMPLES)?,
        })
    }

    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        self.inner.process(input)
    }

    /// Drains held-back input and the filter delay.
    pub fn flush(&mut self) -> Vec<i16> {
        self.inner.flush()
    }

    /// Output samples of latency ahead of the first input sample.
    pub fn delay(&self) -> usize {
        self.inner.delay()
    }
}

/// Downsamples a complete clip, trimming the filter delay so the result is
/// time-aligned and half as long (rounded up).
pub fn downsample_clip(pcm16k: &[i16]) -> Result<Vec<i16>, MediaError> {
    let mut down = Downsampler2x::new()?;
    let delay = down.delay();
    let mut out = down.process(pcm16k);
    out.extend(down.flush());
    let wanted = pcm16k.len().div_ceil(2);
    Ok(out.into_iter().skip(delay).take(wanted).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, rate: f64, len: usize, amplitude: f64) -> Vec<i16> {
        (0..len)
            .map(|n| (amplitude * (2.0 * PI * freq * n as f64 / rate).sin()).round() as i16)
            .collect()
    }

    fn rms(samples: &[i16]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn whole_chunks_double_and_halve() {
        let mut up = Upsampler2x::new().unwrap();
        let mut down = Downsampler2x::new().unwrap();
        assert_eq!(up.process(&[0; 160]).len(), 320);
        assert_eq!(down.process(&[0; 320]).len(), 160);
    }

    #[test]
    fn partial_input_waits_for_a_full_chunk() {
        let mut up = Upsampler2x::new().unwrap();
        assert!(up.process(&[0; 100]).is_empty());
        assert_eq!(up.process(&[0; 60]).len(), 320);
    }

    #[test]
    fn upsampled_tone_keeps_level() {
        let input = sine(1000.0, 8000.0, 4000, 10000.0);
        let mut up = Upsampler2x::new().unwrap();
        let out = up.process(&input);
        assert_eq!(out.len(), 8000);
        let ratio = rms(&out[2000..7000]) / rms(&input[1000..3500]);
        assert!((ratio - 1.0).abs() < 0.05, "ratio {}", ratio);
    }

    #[test]
    fn downsampling_rejects_energy_above_nyquist() {
        // 6kHz aliases to 2kHz unless filtered out.
        let input = sine(6000.0, 16000.0, 6400, 10000.0);
        let mut down = Downsampler2x::new().unwrap();
        let out = down.process(&input);
        assert_eq!(out.len(), 3200);
        assert!(rms(&out[800..]) < 100.0, "rms {}", rms(&out[800..]));
    }

    #[test]
    fn frame_by_frame_matches_one_shot() {
        let input = sine(440.0, 8000.0, 1600, 8000.0);
        let mut whole = Upsampler2x::new().unwrap();
        let expected = whole.process(&input);

        let mut framed = Upsampler2x::new().unwrap();
        let mut got = Vec::new();
        for frame in input.chunks(160) {
            got.extend(framed.process(frame));
        }
        assert_eq!(got, expected);

        let mut whole = Downsampler2x::new().unwrap();
        let expected = whole.process(&got);
        let mut framed = Downsampler2x::new().unwrap();
        let mut out = Vec::new();
        for frame in got.chunks(317) {
            out.extend(framed.process(frame));
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn flush_covers_the_filter_delay() {
        let mut down = Downsampler2x::new().unwrap();
        let delay = down.delay();
        let mut out = down.process(&[1000; 160]);
        assert!(out.is_empty());
        out.extend(down.flush());
        assert!(out.len() >= 80 + delay, "len {} delay {}", out.len(), delay);
    }

    #[test]
    fn clip_is_trimmed_to_half_length() {
        let clip = sine(500.0, 16000.0, 641, 8000.0);
        let narrow = downsample_clip(&clip).unwrap();
        assert_eq!(narrow.len(), 321);
        assert!(rms(&narrow[80..240]) > 4000.0);
    }
}
