use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use rtp_voice_agent::ai::HttpAiServices;
use rtp_voice_agent::config::{Config, SessionRuntimeConfig};
use rtp_voice_agent::logging;
use rtp_voice_agent::sdp;
use rtp_voice_agent::session::{CallSetup, Collaborators, SessionManager};

/// One line of the signaling bridge on stdin.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SignalingEvent {
    Invite(CallSetup),
    Bye { call_id: String },
    Sdp { call_id: String, sdp: String },
}

/// Written to stdout once a call has been answered.
#[derive(Debug, Serialize)]
struct Answer<'a> {
    event: &'static str,
    call_id: &'a str,
    sdp: &'a str,
}

/// Runs the voice agent until Ctrl-C.
///
/// Calls arrive as newline-delimited JSON on stdin (`invite`, `sdp`, `bye`);
/// each accepted invite is answered with an `answer` line carrying the local
/// SDP.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cfg = Config::from_env();
    let runtime = Arc::new(SessionRuntimeConfig::from_env());
    let ai = Arc::new(HttpAiServices::from_env().context("building AI HTTP client")?);
    log::info!(
        "[main] rtp bind {}, advertised {}, default language {}",
        cfg.rtp_bind_ip,
        cfg.advertised_ip,
        runtime.default_language
    );
    let manager = Arc::new(SessionManager::new(
        cfg.clone(),
        runtime,
        Collaborators::from_services(ai),
    ));

    let sweeper = spawn_sweeper(manager.clone(), cfg.sweep_interval, cfg.session_max_age);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(err) = res {
                    log::warn!("[main] shutdown signal error: {:?}", err);
                }
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(&manager, &line).await,
                Ok(None) => {
                    log::info!("[main] signaling input closed, waiting for Ctrl-C");
                    stdin_open = false;
                }
                Err(err) => {
                    log::error!("[main] signaling input error: {}", err);
                    stdin_open = false;
                }
            },
        }
    }

    sweeper.abort();
    manager.shutdown_all().await;
    log::info!("[main] shutdown complete");
    Ok(())
}

fn spawn_sweeper(
    manager: Arc<SessionManager>,
    every: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.tick().await;
        loop {
            tick.tick().await;
            let ended = manager.sweep(max_age).await;
            if !ended.is_empty() {
                log::info!("[main] swept {} expired call(s)", ended.len());
            }
        }
    })
}

fn parse_event(line: &str) -> Option<SignalingEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(err) => {
            log::warn!("[main] ignoring signaling line: {}", err);
            None
        }
    }
}

async fn handle_line(manager: &SessionManager, line: &str) {
    let Some(event) = parse_event(line) else {
        return;
    };
    match event {
        SignalingEvent::Invite(setup) => {
            let call_id = setup.call_id.clone();
            if manager.register(setup).await.is_err() {
                return;
            }
            if let Some(sdp) = manager.local_sdp(&call_id) {
                let answer = Answer {
                    event: "answer",
                    call_id: &call_id,
                    sdp: &sdp,
                };
                match serde_json::to_string(&answer) {
                    Ok(json) => println!("{}", json),
                    Err(err) => log::warn!("[main] answer for {} not encoded: {}", call_id, err),
                }
            }
        }
        SignalingEvent::Sdp { call_id, sdp } => {
            let Some(session) = manager.get(&call_id) else {
                log::warn!("[main] sdp for unknown call {}", call_id);
                return;
            };
            if let Err(issues) = sdp::validate(&sdp) {
                for issue in issues {
                    log::warn!("[sdp] call {}: {}", call_id, issue);
                }
            }
            let remote = sdp::parse(&sdp)
                .ok()
                .and_then(|desc| sdp::extract_rtp_endpoint(&desc))
                .and_then(|endpoint| endpoint.socket_addr());
            match remote {
                Some(addr) => session.set_remote(addr),
                None => log::warn!("[sdp] call {}: no usable audio endpoint", call_id),
            }
        }
        SignalingEvent::Bye { call_id } => {
            if !manager.end(&call_id).await {
                log::debug!("[main] bye for unknown call {}", call_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_invite_with_default_port() {
        let event = parse_event(
            r#"{"event":"invite","call_id":"c1","remote_ip":"10.0.0.2","remote_port":4000}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            SignalingEvent::Invite(CallSetup {
                call_id: "c1".into(),
                remote_ip: "10.0.0.2".into(),
                remote_port: 4000,
                local_rtp_port: 0,
            })
        );
    }

    #[test]
    fn parses_bye_and_sdp() {
        assert_eq!(
            parse_event(r#"{"event":"bye","call_id":"c1"}"#),
            Some(SignalingEvent::Bye {
                call_id: "c1".into()
            })
        );
        assert!(matches!(
            parse_event(r#"{"event":"sdp","call_id":"c1","sdp":"v=0"}"#),
            Some(SignalingEvent::Sdp { .. })
        ));
    }

    #[test]
    fn ignores_blank_and_unknown_lines() {
        assert_eq!(parse_event("   "), None);
        assert_eq!(parse_event(r#"{"event":"reinvite","call_id":"c1"}"#), None);
        assert_eq!(parse_event("not json"), None);
    }
}
