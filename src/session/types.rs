use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::ports::ai::Language;
use crate::rtp::RtpStats;

pub type CallId = String;

/// What the signaling side hands over for an inbound call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallSetup {
    pub call_id: CallId,
    pub remote_ip: String,
    pub remote_port: u16,
    #[serde(default)]
    pub local_rtp_port: u16,
}

impl CallSetup {
    /// `None` until the remote media address is usable.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        if self.remote_port == 0 {
            return None;
        }
        let ip = self.remote_ip.parse::<IpAddr>().ok()?;
        Some(SocketAddr::new(ip, self.remote_port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    IvrPrompt,
    IvrWait,
    Conversing,
    /// Terminal.
    Ended,
}

/// Inputs that move a session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    PromptScheduled,
    IvrActivity,
    IvrTimeout,
    Hangup,
}

/// Messages into a session's orchestration task.
#[derive(Debug)]
pub(crate) enum SessionControl {
    /// Energy above the keypress threshold while waiting in the IVR.
    IvrActivity,
    /// Encoded 160-byte frames to play after whatever is already queued.
    Speak { frames: Vec<Vec<u8>> },
}

/// Point-in-time view of one call, as reported by the manager.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub call_id: CallId,
    pub state: SessionState,
    pub language: Option<Language>,
    pub started_at: String,
    pub duration_secs: u64,
    pub idle_secs: u64,
    pub transcript_count: usize,
    pub silent_frames: u64,
    pub rtp: RtpStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_addr_requires_ip_and_port() {
        let setup = CallSetup {
            call_id: "a".into(),
            remote_ip: "192.0.2.1".into(),
            remote_port: 4000,
            local_rtp_port: 0,
        };
        assert_eq!(setup.remote_addr(), Some("192.0.2.1:4000".parse().unwrap()));
        let no_port = CallSetup {
            remote_port: 0,
            ..setup.clone()
        };
        assert!(no_port.remote_addr().is_none());
        let hostname = CallSetup {
            remote_ip: "pbx.example".into(),
            ..setup
        };
        assert!(hostname.remote_addr().is_none());
    }

    #[test]
    fn setup_deserializes_with_default_port() {
        let setup: CallSetup =
            serde_json::from_str(r#"{"call_id":"c","remote_ip":"127.0.0.1","remote_port":5000}"#)
                .unwrap();
        assert_eq!(setup.local_rtp_port, 0);
    }
}
