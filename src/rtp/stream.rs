use super::packet::RtpPacket;

/// Timestamp advance per 20ms frame at 8kHz.
pub const TIMESTAMP_STEP: u32 = 160;

/// Outbound SSRC/sequence/timestamp counters. Owned by the send loop only.
#[derive(Debug, Clone)]
pub struct RtpStreamState {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
}

impl RtpStreamState {
    pub fn new(ssrc: u32, sequence_number: u16, timestamp: u32) -> Self {
        Self {
            ssrc,
            sequence_number,
            timestamp,
        }
    }

    pub fn packet(&self, payload_type: u8, payload: Vec<u8>) -> RtpPacket {
        RtpPacket::new(
            payload_type,
            self.sequence_number,
            self.timestamp,
            self.ssrc,
            payload,
        )
    }

    pub fn advance(&mut self, ts_incr: u32) {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(ts_incr);
    }
}
