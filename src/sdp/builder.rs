use std::fmt::Write;
use std::net::Ipv6Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::rtp::codec::{PT_PCMA, PT_PCMU, PT_TELEPHONE_EVENT};

pub const DEFAULT_CODECS: [u8; 2] = [PT_PCMU, PT_PCMA];
const SESSION_NAME: &str = "rtp-voice-agent";

fn rtpmap_for(pt: u8) -> Option<&'static str> {
    match pt {
        0 => Some("PCMU/8000"),
        3 => Some("GSM/8000"),
        8 => Some("PCMA/8000"),
        18 => Some("G729/8000"),
        PT_TELEPHONE_EVENT => Some("telephone-event/8000"),
        _ => None,
    }
}

/// Builds a local descriptor with a single audio block. An empty `codecs`
/// list advertises PCMU and PCMA; `session_id` defaults to the unix time.
pub fn build(local_ip: &str, port: u16, session_id: Option<&str>, codecs: &[u8]) -> String {
    let codecs: &[u8] = if codecs.is_empty() {
        &DEFAULT_CODECS
    } else {
        codecs
    };
    let session_id = match session_id {
        Some(id) => id.to_string(),
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string(),
    };
    let formats = codecs
        .iter()
        .map(|pt| pt.to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let addr_type = if local_ip.parse::<Ipv6Addr>().is_ok() {
        "IP6"
    } else {
        "IP4"
    };

    let mut sdp = String::new();
    let _ = write!(
        sdp,
        concat!(
            "v=0\r\n",
            "o=- {sid} {sid} IN {at} {ip}\r\n",
            "s={name}\r\n",
            "c=IN {at} {ip}\r\n",
            "t=0 0\r\n",
            "m=audio {port} RTP/AVP {formats}\r\n",
        ),
        sid = session_id,
        at = addr_type,
        ip = local_ip,
        name = SESSION_NAME,
        port = port,
        formats = formats
    );
    for &pt in codecs {
        if let Some(map) = rtpmap_for(pt) {
            let _ = write!(sdp, "a=rtpmap:{} {}\r\n", pt, map);
        }
    }
    if codecs.contains(&PT_TELEPHONE_EVENT) {
        sdp.push_str("a=fmtp:101 0-16\r\n");
    }
    sdp.push_str("a=sendrecv\r\n");
    sdp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdp::{extract_rtp_endpoint, parse, validate};

    #[test]
    fn built_descriptor_resolves_back_to_its_endpoint() {
        let text = build("203.0.113.4", 40000, None, &[]);
        let ep = extract_rtp_endpoint(&parse(&text).unwrap()).unwrap();
        assert_eq!(ep.ip, "203.0.113.4");
        assert_eq!(ep.port, 40000);
        assert_eq!(ep.codecs, DEFAULT_CODECS.to_vec());
        assert_eq!(validate(&text), Ok(()));
    }

    #[test]
    fn layout_and_line_endings() {
        let text = build("10.1.1.1", 5004, Some("42"), &[0]);
        assert_eq!(
            text,
            "v=0\r\no=- 42 42 IN IP4 10.1.1.1\r\ns=rtp-voice-agent\r\nc=IN IP4 10.1.1.1\r\nt=0 0\r\n\
m=audio 5004 RTP/AVP 0\r\na=rtpmap:0 PCMU/8000\r\na=sendrecv\r\n"
        );
    }

    #[test]
    fn ipv6_address_is_typed_ip6() {
        let text = build("2001:db8::7", 5004, Some("9"), &[8]);
        assert!(text.contains("o=- 9 9 IN IP6 2001:db8::7\r\n"));
        assert!(text.contains("c=IN IP6 2001:db8::7\r\n"));
        assert!(!text.contains("IP4"));
        let ep = extract_rtp_endpoint(&parse(&text).unwrap()).unwrap();
        assert_eq!(ep.ip, "2001:db8::7");
    }

    #[test]
    fn telephone_event_adds_fmtp() {
        let text = build("10.1.1.1", 5004, Some("1"), &[0, 8, 101]);
        assert!(text.contains("a=rtpmap:101 telephone-event/8000\r\n"));
        assert!(text.contains("a=fmtp:101 0-16\r\n"));
        let without = build("10.1.1.1", 5004, Some("1"), &[0, 8]);
        assert!(!without.contains("fmtp"));
    }

    #[test]
    fn unknown_payload_types_are_listed_without_rtpmap() {
        let text = build("10.1.1.1", 5004, Some("1"), &[0, 96]);
        assert!(text.contains("m=audio 5004 RTP/AVP 0 96\r\n"));
        assert!(!text.contains("a=rtpmap:96"));
    }
}
