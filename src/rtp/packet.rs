/// RTP header size without CSRC list or extension.
pub const RTP_HEADER_LEN: usize = 12;
pub const RTP_VERSION: u8 = 2;

/// Simple RTP packet representation.
/// CSRC lists and header extensions are never emitted; `csrc_count` stays 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    pub fn new(
        payload_type: u8,
        sequence_number: u16,
        timestamp: u32,
        ssrc: u32,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            payload,
        }
    }

    /// Wire form: the fixed header then the payload. Only version, the
    /// padding, extension and marker bits and the payload type are taken
    /// from the flags; the CSRC count is always written as 0.
    pub fn to_bytes(&self) -> Vec<u8> {
        let flags = (self.version & 0x03) << 6
            | u8::from(self.padding) << 5
            | u8::from(self.extension) << 4;
        let marker_pt = u8::from(self.marker) << 7 | (self.payload_type & 0x7F);

        let mut out = Vec::with_capacity(RTP_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&[flags, marker_pt]);
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_matches_rfc3550() {
        let mut pkt = RtpPacket::new(8, 0x1234, 0xDEAD_BEEF, 0x0102_0304, vec![0xAA, 0xBB]);
        pkt.marker = true;
        assert_eq!(
            pkt.to_bytes(),
            vec![0x80, 0x88, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04, 0xAA, 0xBB]
        );
    }

    #[test]
    fn csrc_count_is_never_written() {
        let mut pkt = RtpPacket::new(0, 1, 1, 1, vec![]);
        pkt.csrc_count = 3;
        pkt.padding = true;
        let bytes = pkt.to_bytes();
        assert_eq!(bytes.len(), RTP_HEADER_LEN);
        assert_eq!(bytes[0], 0xA0);
    }
}
