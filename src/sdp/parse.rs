use log::debug;

use crate::error::{SdpError, SdpIssue};
use crate::sdp::{Connection, MediaDescription, Origin, RtpEndpoint, RtpMap, SessionDescription};

const DEFAULT_CLOCK_RATE: u32 = 8000;

/// Parses SDP text. `c=` and `a=` lines belong to the session until the first
/// `m=` line and to the most recent media block after it.
pub fn parse(text: &str) -> Result<SessionDescription, SdpError> {
    let mut sdp = SessionDescription::default();

    for line in text.lines() {
        let line = line.trim();
        let Some((kind, value)) = line.split_once('=') else {
            continue;
        };
        match kind {
            "v" => sdp.version = Some(value.to_string()),
            "o" => {
                sdp.origin = Some(value.to_string());
                sdp.origin_parsed = parse_origin(value);
            }
            "s" => sdp.session_name = Some(value.to_string()),
            "t" => sdp.time = Some(value.to_string()),
            "c" => {
                let conn = parse_connection(value);
                match sdp.media.last_mut() {
                    Some(media) => media.connection = conn,
                    None => sdp.connection = conn,
                }
            }
            "m" => sdp.media.push(parse_media(value)?),
            "a" => match sdp.media.last_mut() {
                Some(media) => {
                    if let Some((pt, map)) = parse_rtpmap(value) {
                        media.rtpmap.insert(pt, map);
                    }
                    media.attributes.push(value.to_string());
                }
                None => sdp.attributes.push(value.to_string()),
            },
            _ => {}
        }
    }
    Ok(sdp)
}

fn parse_origin(value: &str) -> Option<Origin> {
    let cols: Vec<&str> = value.split_whitespace().collect();
    if cols.len() < 6 {
        return None;
    }
    Some(Origin {
        username: cols[0].to_string(),
        session_id: cols[1].to_string(),
        session_version: cols[2].to_string(),
        net_type: cols[3].to_string(),
        addr_type: cols[4].to_string(),
        address: cols[5].to_string(),
    })
}

fn parse_connection(value: &str) -> Option<Connection> {
    let cols: Vec<&str> = value.split_whitespace().collect();
    if cols.len() < 3 {
        return None;
    }
    // multicast "addr/ttl"
    let address = cols[2].split('/').next().unwrap_or(cols[2]);
    if address.is_empty() {
        return None;
    }
    Some(Connection {
        net_type: cols[0].to_string(),
        addr_type: cols[1].to_string(),
        address: address.to_string(),
    })
}

fn parse_media(value: &str) -> Result<MediaDescription, SdpError> {
    let cols: Vec<&str> = value.split_whitespace().collect();
    if cols.len() < 3 {
        return Err(SdpError::InvalidMedia(value.to_string()));
    }
    // "port/count" is allowed
    let port_text = cols[1].split('/').next().unwrap_or(cols[1]);
    let port = port_text
        .parse::<u16>()
        .map_err(|_| SdpError::InvalidPort(cols[1].to_string()))?;
    Ok(MediaDescription {
        media_type: cols[0].to_string(),
        port,
        protocol: cols[2].to_string(),
        formats: cols[3..].iter().map(|f| f.to_string()).collect(),
        connection: None,
        attributes: Vec::new(),
        rtpmap: Default::default(),
    })
}

fn parse_rtpmap(value: &str) -> Option<(u8, RtpMap)> {
    let rest = value.strip_prefix("rtpmap:")?;
    let (pt, encoding) = rest.split_once(' ')?;
    let pt = pt.trim().parse::<u8>().ok()?;
    let mut enc_parts = encoding.trim().split('/');
    let name = enc_parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let clock_rate = enc_parts
        .next()
        .and_then(|r| r.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_CLOCK_RATE);
    Some((
        pt,
        RtpMap {
            encoding: name.to_string(),
            clock_rate,
        },
    ))
}

/// First usable audio media block with its resolved connection address; the
/// media level `c=` wins over the session level one. Port 0 marks a rejected
/// stream and is skipped.
pub fn extract_rtp_endpoint(sdp: &SessionDescription) -> Option<RtpEndpoint> {
    let media = sdp.media.iter().find(|m| m.is_audio() && m.port != 0)?;
    let conn = media.connection.as_ref().or(sdp.connection.as_ref())?;
    Some(RtpEndpoint {
        ip: conn.address.clone(),
        port: media.port,
        codecs: media.payload_types(),
    })
}

pub fn validate(text: &str) -> Result<(), Vec<SdpIssue>> {
    let sdp = match parse(text) {
        Ok(sdp) => sdp,
        Err(e) => return Err(vec![SdpIssue::Parse(e)]),
    };

    let mut issues = Vec::new();
    match sdp.version.as_deref() {
        None | Some("") => issues.push(SdpIssue::MissingVersion),
        Some("0") => {}
        Some(other) => issues.push(SdpIssue::UnsupportedVersion(other.to_string())),
    }
    if sdp.origin.as_deref().map_or(true, str::is_empty) {
        issues.push(SdpIssue::MissingOrigin);
    }
    if sdp.session_name.as_deref().map_or(true, str::is_empty) {
        issues.push(SdpIssue::MissingSessionName);
    }
    if sdp.time.as_deref().map_or(true, str::is_empty) {
        issues.push(SdpIssue::MissingTime);
    }
    if sdp.media.is_empty() {
        issues.push(SdpIssue::MissingMedia);
    }
    for (index, media) in sdp.media.iter().enumerate().filter(|(_, m)| m.is_audio()) {
        if media.connection.is_none() && sdp.connection.is_none() {
            issues.push(SdpIssue::MissingConnection { index });
        }
        if media.port == 0 {
            issues.push(SdpIssue::ZeroPort { index });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        debug!("[sdp] validation failed: {:?}", issues);
        Err(issues)
    }
}
