use thiserror::Error;

use crate::rtp::packet::{RtpPacket, RTP_HEADER_LEN, RTP_VERSION};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpParseError {
    #[error("datagram too short for an RTP header ({0} bytes)")]
    TooShort(usize),
    #[error("unsupported RTP version {0}")]
    UnsupportedVersion(u8),
}

/// Parses the fixed 12-byte header; every byte after it is treated as payload.
pub fn parse_rtp_packet(buf: &[u8]) -> Result<RtpPacket, RtpParseError> {
    if buf.len() < RTP_HEADER_LEN {
        return Err(RtpParseError::TooShort(buf.len()));
    }

    let b0 = buf[0];
    let b1 = buf[1];

    let version = b0 >> 6;
    if version != RTP_VERSION {
        return Err(RtpParseError::UnsupportedVersion(version));
    }

    let padding = (b0 & 0b0010_0000) != 0;
    let extension = (b0 & 0b0001_0000) != 0;
    let csrc_count = b0 & 0b0000_1111;
    let marker = (b1 & 0b1000_0000) != 0;
    let payload_type = b1 & 0b0111_1111;

    let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
    let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

    Ok(RtpPacket {
        version,
        padding,
        extension,
        csrc_count,
        marker,
        payload_type,
        sequence_number,
        timestamp,
        ssrc,
        payload: buf[RTP_HEADER_LEN..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_datagrams() {
        assert_eq!(parse_rtp_packet(&[0x80; 11]), Err(RtpParseError::TooShort(11)));
        assert_eq!(parse_rtp_packet(&[]), Err(RtpParseError::TooShort(0)));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = vec![0u8; 20];
        bytes[0] = 0x40;
        assert_eq!(
            parse_rtp_packet(&bytes),
            Err(RtpParseError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn parses_built_packet() {
        let pkt = RtpPacket::new(0, 65535, u32::MAX, 0xCAFE_F00D, vec![0xFF; 160]);
        let parsed = parse_rtp_packet(&pkt.to_bytes()).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn header_only_packet_has_empty_payload() {
        let pkt = RtpPacket::new(8, 7, 7, 7, vec![]);
        let parsed = parse_rtp_packet(&pkt.to_bytes()).unwrap();
        assert!(parsed.payload.is_empty());
        assert_eq!(parsed.payload_type, 8);
    }
}
