use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtp_voice_agent::config::{Config, SessionRuntimeConfig};
use rtp_voice_agent::error::{AsrError, LlmError, TtsError};
use rtp_voice_agent::media::AudioClip;
use rtp_voice_agent::ports::ai::{
    AiFuture, AsrPort, ChatMessage, Language, LlmPort, TranscriberStream, TranscriptEvent, TtsPort,
};
use rtp_voice_agent::session::{CallSetup, Collaborators, SessionManager, SessionState};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Default)]
struct ScriptedAi {
    opened: Mutex<Vec<Language>>,
    cleared: Mutex<Vec<String>>,
}

struct Discard;

impl TranscriberStream for Discard {
    fn feed(&mut self, _pcm16k: &[i16]) {}
    fn close(&mut self) {}
}

impl AsrPort for ScriptedAi {
    fn open_stream(
        &self,
        _call_id: &str,
        language: Language,
        _events: UnboundedSender<TranscriptEvent>,
    ) -> Result<Box<dyn TranscriberStream>, AsrError> {
        self.opened.lock().unwrap().push(language);
        Ok(Box::new(Discard))
    }
}

impl LlmPort for ScriptedAi {
    fn generate_answer(
        &self,
        _conversation_id: String,
        _messages: Vec<ChatMessage>,
    ) -> AiFuture<Result<String, LlmError>> {
        Box::pin(async { Ok("ok".to_string()) })
    }

    fn clear_conversation(&self, conversation_id: &str) {
        self.cleared.lock().unwrap().push(conversation_id.to_string());
    }
}

impl TtsPort for ScriptedAi {
    fn synthesize(&self, _text: String, _language: Language) -> AiFuture<Result<AudioClip, TtsError>> {
        Box::pin(async { Ok(AudioClip::Pcm16k(vec![0; 640])) })
    }
}

fn manager(ai: Arc<ScriptedAi>, runtime: SessionRuntimeConfig) -> SessionManager {
    let config = Config {
        rtp_bind_ip: Ipv4Addr::LOCALHOST.into(),
        advertised_ip: "127.0.0.1".into(),
        rtp_send_queue: 64,
        rtp_join_timeout: Duration::from_millis(500),
        session_max_age: Duration::from_secs(1_800),
        sweep_interval: Duration::from_secs(30),
    };
    SessionManager::new(config, Arc::new(runtime), Collaborators::from_services(ai))
}

fn invite(call_id: &str) -> CallSetup {
    CallSetup {
        call_id: call_id.into(),
        remote_ip: String::new(),
        remote_port: 0,
        local_rtp_port: 0,
    }
}

#[tokio::test]
async fn silent_caller_gets_default_language_after_ivr_timeout() {
    let ai = Arc::new(ScriptedAi::default());
    let manager = manager(
        ai.clone(),
        SessionRuntimeConfig {
            default_language: Language::En,
            ivr_timeout: Duration::from_millis(300),
            ivr_prompt_delay: Duration::ZERO,
            ..SessionRuntimeConfig::default()
        },
    );
    let session = manager.register(invite("quiet")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), SessionState::IvrWait);
    assert_eq!(session.language(), None);

    for _ in 0..200 {
        if session.state() == SessionState::Conversing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.state(), SessionState::Conversing);
    assert_eq!(session.language(), Some(Language::En));
    assert_eq!(*ai.opened.lock().unwrap(), vec![Language::En]);

    assert!(manager.end("quiet").await);
    assert_eq!(session.state(), SessionState::Ended);
    assert_eq!(*ai.cleared.lock().unwrap(), vec!["conv_quiet".to_string()]);
}

#[tokio::test]
async fn ending_twice_is_harmless() {
    let ai = Arc::new(ScriptedAi::default());
    let manager = manager(ai.clone(), SessionRuntimeConfig::default());
    let kept = manager.register(invite("kept")).await.unwrap();
    manager.register(invite("gone")).await.unwrap();

    assert!(manager.end("gone").await);
    assert!(!manager.end("gone").await);

    assert_eq!(manager.active_calls(), vec!["kept".to_string()]);
    assert!(kept.stats().rtp.running);
    assert_eq!(*ai.cleared.lock().unwrap(), vec!["conv_gone".to_string()]);

    manager.shutdown_all().await;
    assert!(manager.is_empty());
}
