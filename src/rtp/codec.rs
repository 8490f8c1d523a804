//! G.711 companding (μ-law / A-law) and static payload type mapping.
//!
//! Every function here is pure; nothing holds state between calls.

use thiserror::Error;

pub const PT_PCMU: u8 = 0;
pub const PT_PCMA: u8 = 8;
pub const PT_TELEPHONE_EVENT: u8 = 101;

/// μ-law byte that decodes to 0.
pub const MULAW_SILENCE: u8 = 0xFF;
/// A-law byte for the smallest positive level.
pub const ALAW_SILENCE: u8 = 0xD5;

const MULAW_BIAS: i32 = 132;
const MULAW_CLIP: i32 = 32635;
const MULAW_EXP_LUT: [i16; 8] = [0, 132, 396, 924, 1980, 4092, 8316, 16764];
const ALAW_SEG_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported payload type {0}")]
pub struct UnsupportedPayload(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Codec {
    Pcmu,
    Pcma,
}

impl Codec {
    pub fn from_pt(pt: u8) -> Result<Self, UnsupportedPayload> {
        match pt {
            PT_PCMU => Ok(Self::Pcmu),
            PT_PCMA => Ok(Self::Pcma),
            other => Err(UnsupportedPayload(other)),
        }
    }

    pub fn payload_type(self) -> u8 {
        match self {
            Self::Pcmu => PT_PCMU,
            Self::Pcma => PT_PCMA,
        }
    }

    pub fn silence_byte(self) -> u8 {
        match self {
            Self::Pcmu => MULAW_SILENCE,
            Self::Pcma => ALAW_SILENCE,
        }
    }

    pub fn encode(self, pcm: &[i16]) -> Vec<u8> {
        match self {
            Self::Pcmu => encode(pcm),
            Self::Pcma => pcm.iter().map(|&s| linear16_to_alaw(s)).collect(),
        }
    }

    pub fn decode(self, payload: &[u8]) -> Vec<i16> {
        match self {
            Self::Pcmu => decode(payload),
            Self::Pcma => payload.iter().map(|&a| alaw_to_linear16(a)).collect(),
        }
    }

    /// Re-encodes μ-law bytes for this codec (identity for PCMU).
    pub fn from_mulaw(self, mulaw: &[u8]) -> Vec<u8> {
        match self {
            Self::Pcmu => mulaw.to_vec(),
            Self::Pcma => mulaw
                .iter()
                .map(|&mu| linear16_to_alaw(mulaw_to_linear16(mu)))
                .collect(),
        }
    }
}

/// Encodes 16-bit linear PCM as μ-law.
pub fn encode(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().map(|&s| linear16_to_mulaw(s)).collect()
}

/// Decodes μ-law bytes to 16-bit linear PCM.
pub fn decode(mulaw: &[u8]) -> Vec<i16> {
    mulaw.iter().map(|&b| mulaw_to_linear16(b)).collect()
}

pub fn linear16_to_mulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign: u8 = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };
    if pcm > MULAW_CLIP {
        pcm = MULAW_CLIP;
    }
    pcm += MULAW_BIAS;

    let mut exponent: u8 = 7;
    let mut mask: i32 = 0x4000;
    while exponent > 0 && (pcm & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = ((pcm >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

pub fn mulaw_to_linear16(mu: u8) -> i16 {
    let mu = !mu;
    let negative = (mu & 0x80) != 0;
    let exponent = ((mu >> 4) & 0x07) as usize;
    let mantissa = (mu & 0x0F) as i16;

    let magnitude = MULAW_EXP_LUT[exponent] + (mantissa << (exponent + 3));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

pub fn linear16_to_alaw(sample: i16) -> u8 {
    let mut pcm = (sample as i32) >> 3;
    let mask: u8 = if pcm >= 0 {
        0xD5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let Some(segment) = ALAW_SEG_END.iter().position(|&end| pcm <= end) else {
        return 0x7F ^ mask;
    };
    let mut aval = (segment as u8) << 4;
    if segment < 2 {
        aval |= ((pcm >> 1) & 0x0F) as u8;
    } else {
        aval |= ((pcm >> segment) & 0x0F) as u8;
    }
    aval ^ mask
}

pub fn alaw_to_linear16(a: u8) -> i16 {
    let a = a ^ 0x55;
    let mut value = ((a & 0x0F) as i16) << 4;
    let segment = (a & 0x70) >> 4;
    match segment {
        0 => value += 8,
        1 => value += 0x108,
        _ => {
            value += 0x108;
            value <<= segment - 1;
        }
    }
    if (a & 0x80) != 0 {
        value
    } else {
        -value
    }
}

/// Quantisation step of the μ-law segment a byte belongs to.
pub fn mulaw_step(mu: u8) -> i32 {
    let exponent = ((!mu) >> 4) & 0x07;
    1 << (exponent + 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_constants() {
        assert_eq!(linear16_to_mulaw(0), 0xFF);
        assert_eq!(mulaw_to_linear16(0xFF), 0);
        assert_eq!(encode(&[0, 0]), vec![MULAW_SILENCE, MULAW_SILENCE]);
        assert_eq!(linear16_to_alaw(0), ALAW_SILENCE);
    }

    #[test]
    fn mulaw_round_trip_within_one_step() {
        for x in -32635i32..=32635 {
            let byte = linear16_to_mulaw(x as i16);
            let back = mulaw_to_linear16(byte) as i32;
            let step = mulaw_step(byte);
            assert!(
                (back - x).abs() <= step,
                "x={} decoded={} step={}",
                x,
                back,
                step
            );
        }
    }

    #[test]
    fn mulaw_clips_extremes() {
        assert_eq!(linear16_to_mulaw(i16::MAX), linear16_to_mulaw(32635));
        assert_eq!(linear16_to_mulaw(i16::MIN), linear16_to_mulaw(-32635));
        assert!(mulaw_to_linear16(linear16_to_mulaw(i16::MIN)) < -31000);
    }

    #[test]
    fn mulaw_preserves_sign() {
        assert!(mulaw_to_linear16(linear16_to_mulaw(1000)) > 0);
        assert!(mulaw_to_linear16(linear16_to_mulaw(-1000)) < 0);
    }

    #[test]
    fn alaw_round_trip_is_close() {
        for x in (-32000i32..=32000).step_by(37) {
            let back = alaw_to_linear16(linear16_to_alaw(x as i16)) as i32;
            let tolerance = (x.abs() / 16).max(16);
            assert!((back - x).abs() <= tolerance, "x={} decoded={}", x, back);
        }
    }

    #[test]
    fn codec_from_payload_type() {
        assert_eq!(Codec::from_pt(0), Ok(Codec::Pcmu));
        assert_eq!(Codec::from_pt(8), Ok(Codec::Pcma));
        assert_eq!(Codec::from_pt(18), Err(UnsupportedPayload(18)));
        assert_eq!(Codec::Pcma.payload_type(), 8);
    }

    #[test]
    fn pcma_transcode_from_mulaw_keeps_level() {
        let mulaw = encode(&[0, 4000, -4000]);
        let alaw = Codec::Pcma.from_mulaw(&mulaw);
        let pcm = Codec::Pcma.decode(&alaw);
        assert!(pcm[0].abs() <= 8);
        assert!((pcm[1] as i32 - 4000).abs() < 300);
        assert!((pcm[2] as i32 + 4000).abs() < 300);
    }
}
