//! SDP offer/answer handling: parse remote descriptors, build local answers
//! and resolve the remote RTP endpoint.

pub mod builder;
pub mod parse;

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use serde::Serialize;

pub use builder::{build, DEFAULT_CODECS};
pub use parse::{extract_rtp_endpoint, parse, validate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub encoding: String,
    pub clock_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub media_type: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<String>,
    pub connection: Option<Connection>,
    pub attributes: Vec<String>,
    pub rtpmap: BTreeMap<u8, RtpMap>,
}

impl MediaDescription {
    pub fn is_audio(&self) -> bool {
        self.media_type == "audio"
    }

    /// Numeric payload types from the `m=` format list, in offer order.
    pub fn payload_types(&self) -> Vec<u8> {
        self.formats
            .iter()
            .filter_map(|f| f.parse::<u8>().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDescription {
    pub version: Option<String>,
    pub origin: Option<String>,
    pub origin_parsed: Option<Origin>,
    pub session_name: Option<String>,
    pub connection: Option<Connection>,
    pub time: Option<String>,
    pub attributes: Vec<String>,
    pub media: Vec<MediaDescription>,
}

/// Where the remote side expects our RTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RtpEndpoint {
    pub ip: String,
    pub port: u16,
    pub codecs: Vec<u8>,
}

impl RtpEndpoint {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let ip = self.ip.parse::<IpAddr>().ok()?;
        Some(SocketAddr::new(ip, self.port))
    }
}
