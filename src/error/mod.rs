pub mod ai;

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub use ai::{AsrError, LlmError, TtsError};

#[derive(Debug, Error)]
pub enum RtpError {
    #[error("failed to bind RTP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("RTP engine already started")]
    AlreadyStarted,
    #[error("RTP socket error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdpError {
    #[error("invalid media line: {0}")]
    InvalidMedia(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// A single finding reported by SDP validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdpIssue {
    #[error("missing version (v=)")]
    MissingVersion,
    #[error("unsupported SDP version {0}")]
    UnsupportedVersion(String),
    #[error("missing origin (o=)")]
    MissingOrigin,
    #[error("missing session name (s=)")]
    MissingSessionName,
    #[error("missing time description (t=)")]
    MissingTime,
    #[error("missing media description (m=)")]
    MissingMedia,
    #[error("media {index}: no connection address")]
    MissingConnection { index: usize },
    #[error("media {index}: port is zero")]
    ZeroPort { index: usize },
    #[error("parse error: {0}")]
    Parse(SdpError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] RtpError),
    #[error("media setup failed: {0}")]
    Media(#[from] MediaError),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("resampler setup failed: {0}")]
    Resampler(#[from] rubato::ResamplerConstructionError),
}
