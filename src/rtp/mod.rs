pub mod codec;
pub mod dtmf;
pub mod engine;
pub mod packet;
pub mod parser;
pub mod stream;

pub use codec::Codec;
pub use engine::{AudioCallback, RtpEngine, RtpEngineConfig, RtpStats};
pub use packet::RtpPacket;
pub use parser::{parse_rtp_packet, RtpParseError};
