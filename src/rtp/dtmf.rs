//! In-band DTMF synthesis. Digits are sent as audio, never as RFC 2833 events.

use std::f64::consts::PI;
use std::time::Duration;

use super::codec;

pub const DEFAULT_TONE_DURATION: Duration = Duration::from_millis(100);

const LOW_FREQS: [f64; 4] = [697.0, 770.0, 852.0, 941.0];
const HIGH_FREQS: [f64; 4] = [1209.0, 1336.0, 1477.0, 1633.0];
const DTMF_MAP: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];
const TONE_AMPLITUDE: f64 = 16383.0;

/// Returns the (low, high) frequency pair for a keypad digit.
pub fn dtmf_frequencies(digit: char) -> Option<(f64, f64)> {
    let digit = digit.to_ascii_uppercase();
    DTMF_MAP.iter().enumerate().find_map(|(row, keys)| {
        keys.iter()
            .position(|&k| k == digit)
            .map(|col| (LOW_FREQS[row], HIGH_FREQS[col]))
    })
}

/// Synthesizes `digit` as μ-law audio. Returns `None` for non-keypad characters.
pub fn generate_dtmf(digit: char, duration: Duration, sample_rate: u32) -> Option<Vec<u8>> {
    let (low, high) = dtmf_frequencies(digit)?;
    let sample_count = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
    let rate = sample_rate as f64;
    let pcm: Vec<i16> = (0..sample_count)
        .map(|n| {
            let t = n as f64 / rate;
            let mixed = (2.0 * PI * low * t).sin() + (2.0 * PI * high * t).sin();
            (mixed * TONE_AMPLITUDE / 2.0) as i16
        })
        .collect();
    Some(codec::encode(&pcm))
}
