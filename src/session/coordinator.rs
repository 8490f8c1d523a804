//! One call: the RTP engine, the orchestration task (IVR timer, playback
//! pacing) and the turn worker (STT -> LLM -> TTS).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};

use crate::config::SessionRuntimeConfig;
use crate::error::{SessionError, TtsError};
use crate::media::converter::clip_to_wire;
use crate::media::{chunk_wire_frames, mean_abs, AudioConverter, FRAME_DURATION_MS};
use crate::ports::ai::{
    AiServices, AsrPort, Language, LlmPort, TranscriberStream, TranscriptEvent, TtsPort,
};
use crate::rtp::dtmf::DEFAULT_TONE_DURATION;
use crate::rtp::{AudioCallback, Codec, RtpEngine, RtpEngineConfig, RtpPacket};
use crate::sdp;
use crate::session::conversation::{Conversation, TranscriptEntry};
use crate::session::ivr::{
    apology, is_keypress, language_for, welcome_message, IvrOutcome, IVR_PROMPT,
    IVR_PROMPT_LANGUAGE,
};
use crate::session::playback::PlaybackQueue;
use crate::session::state_machine::SessionStateMachine;
use crate::session::types::{
    CallId, CallSetup, SessionControl, SessionEvent, SessionState, SessionStats,
};

/// The external engines a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub asr: Arc<dyn AsrPort>,
    pub llm: Arc<dyn LlmPort>,
    pub tts: Arc<dyn TtsPort>,
}

impl Collaborators {
    pub fn from_services<T: AiServices + 'static>(services: Arc<T>) -> Self {
        Self {
            asr: services.clone(),
            llm: services.clone(),
            tts: services,
        }
    }
}

/// State touched by both the receive path and the AI path.
struct CallState {
    machine: SessionStateMachine,
    language: Option<Language>,
    transcript: Vec<TranscriptEntry>,
    silent_frames: u64,
    last_activity: Instant,
    ivr_signalled: bool,
    transcriber: Option<Box<dyn TranscriberStream>>,
    inbound: AudioConverter,
}

type SharedState = Arc<Mutex<CallState>>;

fn lock(state: &Mutex<CallState>) -> MutexGuard<'_, CallState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Session {
    call_id: CallId,
    conversation_id: String,
    engine: Arc<RtpEngine>,
    state: SharedState,
    collaborators: Collaborators,
    config: Arc<SessionRuntimeConfig>,
    local_addr: SocketAddr,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Session {
    /// Binds the call's RTP endpoint and starts the IVR. A bind failure means
    /// the call cannot be answered.
    pub async fn start(
        setup: CallSetup,
        engine_cfg: RtpEngineConfig,
        config: Arc<SessionRuntimeConfig>,
        collaborators: Collaborators,
    ) -> Result<Arc<Self>, SessionError> {
        let codec = engine_cfg.codec;
        let engine = Arc::new(RtpEngine::new(engine_cfg));
        let local_addr = engine
            .start(setup.local_rtp_port, setup.remote_addr())
            .await?;

        let call_id = setup.call_id;
        let conversation = Conversation::for_call(&call_id);
        let conversation_id = conversation.id().to_string();
        let inbound = match AudioConverter::new(codec) {
            Ok(converter) => converter,
            Err(e) => {
                engine.stop().await;
                return Err(e.into());
            }
        };
        let state: SharedState = Arc::new(Mutex::new(CallState {
            machine: SessionStateMachine::new(),
            language: None,
            transcript: Vec::new(),
            silent_frames: 0,
            last_activity: Instant::now(),
            ivr_signalled: false,
            transcriber: None,
            inbound,
        }));

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (say_tx, say_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        engine.set_audio_callback(inbound_callback(
            state.clone(),
            control_tx.clone(),
            config.clone(),
        ));

        let orchestrator = Orchestrator {
            call_id: call_id.clone(),
            engine: engine.clone(),
            state: state.clone(),
            config: config.clone(),
            asr: collaborators.asr.clone(),
            tts: collaborators.tts.clone(),
            codec,
            playback: PlaybackQueue::default(),
            say_tx,
            events_tx,
        };
        let worker = TurnWorker {
            call_id: call_id.clone(),
            state: state.clone(),
            config: config.clone(),
            llm: collaborators.llm.clone(),
            tts: collaborators.tts.clone(),
            codec,
            control_tx,
            conversation,
        };
        let tasks = vec![
            tokio::spawn(orchestrator.run(control_rx, shutdown_rx.clone())),
            tokio::spawn(worker.run(say_rx, events_rx, shutdown_rx)),
        ];

        info!(
            "[session {}] started local={} remote={:?}",
            call_id,
            local_addr,
            engine.remote()
        );
        Ok(Arc::new(Self {
            call_id,
            conversation_id,
            engine,
            state,
            collaborators,
            config,
            local_addr,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            shutdown: shutdown_tx,
            tasks: Mutex::new(tasks),
            stopped: AtomicBool::new(false),
        }))
    }

    /// Ends the call: stops the tasks and the RTP engine, closes the
    /// transcriber and clears the LLM history. Repeat calls do nothing.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.state).machine.advance(SessionEvent::Hangup);
        let _ = self.shutdown.send(true);
        self.engine.clear_audio_callback();
        self.engine.stop().await;

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            join_bounded(task, self.config.join_timeout, &self.call_id).await;
        }

        let transcriber = lock(&self.state).transcriber.take();
        if let Some(mut transcriber) = transcriber {
            transcriber.close();
        }
        self.collaborators
            .llm
            .clear_conversation(&self.conversation_id);
        info!(
            "[session {}] ended after {}s",
            self.call_id,
            self.started_at.elapsed().as_secs()
        );
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.engine.remote()
    }

    /// Points outbound audio at a (re)negotiated remote endpoint.
    pub fn set_remote(&self, remote: SocketAddr) {
        info!("[session {}] remote RTP endpoint {}", self.call_id, remote);
        self.engine.set_remote(remote);
    }

    pub fn state(&self) -> SessionState {
        lock(&self.state).machine.state()
    }

    pub fn language(&self) -> Option<Language> {
        lock(&self.state).language
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        lock(&self.state).transcript.clone()
    }

    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// SDP answer advertising this call's bound RTP port and codec.
    pub fn local_sdp(&self, advertised_ip: &str) -> String {
        sdp::build(
            advertised_ip,
            self.local_addr.port(),
            None,
            &[self.engine.codec().payload_type()],
        )
    }

    pub async fn send_dtmf(&self, digit: char) -> bool {
        self.engine.send_dtmf(digit, DEFAULT_TONE_DURATION).await
    }

    pub fn stats(&self) -> SessionStats {
        let (state, language, idle, transcript_count, silent_frames) = {
            let st = lock(&self.state);
            (
                st.machine.state(),
                st.language,
                st.last_activity.elapsed(),
                st.transcript.len(),
                st.silent_frames,
            )
        };
        SessionStats {
            call_id: self.call_id.clone(),
            state,
            language,
            started_at: self.started_wall.to_rfc3339(),
            duration_secs: self.started_at.elapsed().as_secs(),
            idle_secs: idle.as_secs(),
            transcript_count,
            silent_frames,
            rtp: self.engine.stats(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn join_bounded(mut task: JoinHandle<()>, limit: Duration, call_id: &str) {
    if timeout(limit, &mut task).await.is_err() {
        warn!("[session {}] task did not stop within {:?}, aborting", call_id, limit);
        task.abort();
    }
}

/// Runs on the RTP receive loop, so it only does bounded in-memory work.
fn inbound_callback(
    state: SharedState,
    control_tx: UnboundedSender<SessionControl>,
    config: Arc<SessionRuntimeConfig>,
) -> AudioCallback {
    Arc::new(move |pkt: &RtpPacket| {
        let Ok(codec) = Codec::from_pt(pkt.payload_type) else {
            debug!("[session] ignoring payload type {}", pkt.payload_type);
            return;
        };
        let pcm = codec.decode(&pkt.payload);

        let mut st = lock(&state);
        st.last_activity = Instant::now();
        match st.machine.state() {
            SessionState::IvrWait => {
                if !st.ivr_signalled && is_keypress(&pcm, config.ivr_energy_threshold) {
                    st.ivr_signalled = true;
                    let _ = control_tx.send(SessionControl::IvrActivity);
                }
            }
            SessionState::Conversing => {
                if mean_abs(&pcm) < config.silence_threshold {
                    st.silent_frames += 1;
                } else {
                    st.silent_frames = 0;
                }
                if st.inbound.codec() != codec {
                    match AudioConverter::new(codec) {
                        Ok(converter) => st.inbound = converter,
                        Err(e) => {
                            warn!("[session] cannot switch inbound codec to {:?}: {}", codec, e);
                            return;
                        }
                    }
                }
                let wide = st.inbound.pcm_to_model_rate(&pcm);
                if let Some(transcriber) = st.transcriber.as_mut() {
                    transcriber.feed(&wide);
                }
            }
            SessionState::IvrPrompt | SessionState::Ended => {}
        }
    })
}

async fn synthesize_frames(
    tts: Arc<dyn TtsPort>,
    text: String,
    language: Language,
    limit: Duration,
    codec: Codec,
) -> Result<Vec<Vec<u8>>, TtsError> {
    let clip = timeout(limit, tts.synthesize(text, language))
        .await
        .map_err(|_| TtsError::Timeout)??;
    let wire = clip_to_wire(&clip, codec).map_err(|e| TtsError::UnsupportedAudio(e.to_string()))?;
    Ok(chunk_wire_frames(&wire, codec.silence_byte()))
}

/// IVR timer and 20ms playback pacing.
struct Orchestrator {
    call_id: CallId,
    engine: Arc<RtpEngine>,
    state: SharedState,
    config: Arc<SessionRuntimeConfig>,
    asr: Arc<dyn AsrPort>,
    tts: Arc<dyn TtsPort>,
    codec: Codec,
    playback: PlaybackQueue,
    say_tx: UnboundedSender<String>,
    events_tx: UnboundedSender<TranscriptEvent>,
}

impl Orchestrator {
    async fn run(
        mut self,
        mut control_rx: UnboundedReceiver<SessionControl>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if !self.announce_ivr(&mut shutdown).await {
            return;
        }
        let mut ivr_deadline = Some(Instant::now() + self.config.ivr_timeout);
        let mut tick = interval(Duration::from_millis(FRAME_DURATION_MS));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = ivr_deadline;
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tick.tick() => self.step_playback(),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    ivr_deadline = None;
                    self.finish_ivr(IvrOutcome::Timeout);
                }
                ctrl = control_rx.recv() => match ctrl {
                    Some(SessionControl::IvrActivity) => {
                        if ivr_deadline.take().is_some() {
                            self.finish_ivr(IvrOutcome::Activity);
                        }
                    }
                    Some(SessionControl::Speak { frames }) => self.playback.enqueue(frames),
                    None => break,
                },
            }
        }
        let dropped = self.playback.cancel();
        debug!(
            "[session {}] orchestration finished ({} frames unsent)",
            self.call_id, dropped
        );
    }

    /// Synthesizes the language menu and schedules it after the stabilisation
    /// delay. Returns `false` if the call ended meanwhile.
    async fn announce_ivr(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let synth = synthesize_frames(
            self.tts.clone(),
            IVR_PROMPT.to_string(),
            IVR_PROMPT_LANGUAGE,
            self.config.tts_timeout,
            self.codec,
        );
        let result = tokio::select! {
            _ = shutdown.changed() => return false,
            result = synth => result,
        };
        match result {
            Ok(frames) => {
                debug!("[session {}] IVR prompt ready ({} frames)", self.call_id, frames.len());
                self.playback.enqueue(frames);
                self.playback
                    .delay_until(Instant::now() + self.config.ivr_prompt_delay);
            }
            Err(e) => warn!(
                "[session {}] IVR prompt synthesis failed, waiting without prompt: {}",
                self.call_id, e
            ),
        }
        lock(&self.state).machine.advance(SessionEvent::PromptScheduled);
        true
    }

    fn finish_ivr(&mut self, outcome: IvrOutcome) {
        let language = language_for(outcome, self.config.default_language);
        let transcriber = match self
            .asr
            .open_stream(&self.call_id, language, self.events_tx.clone())
        {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("[session {}] could not open transcriber: {}", self.call_id, e);
                None
            }
        };

        let event = match outcome {
            IvrOutcome::Activity => SessionEvent::IvrActivity,
            IvrOutcome::Timeout => SessionEvent::IvrTimeout,
        };
        {
            let mut st = lock(&self.state);
            if st.machine.advance(event) != Some(SessionState::Conversing) {
                drop(st);
                if let Some(mut transcriber) = transcriber {
                    transcriber.close();
                }
                return;
            }
            st.language = Some(language);
            st.transcriber = transcriber;
            st.silent_frames = 0;
        }

        let skipped = self.playback.cancel();
        info!(
            "[session {}] IVR finished by {:?}, language={} ({} prompt frames skipped)",
            self.call_id, outcome, language, skipped
        );
        let _ = self.say_tx.send(welcome_message(language).to_string());
    }

    fn step_playback(&mut self) {
        if let Some(frame) = self.playback.next_frame(Instant::now()) {
            self.engine.send_audio(frame);
        }
    }
}

/// Turns transcripts into spoken answers. Owns the conversation history.
struct TurnWorker {
    call_id: CallId,
    state: SharedState,
    config: Arc<SessionRuntimeConfig>,
    llm: Arc<dyn LlmPort>,
    tts: Arc<dyn TtsPort>,
    codec: Codec,
    control_tx: UnboundedSender<SessionControl>,
    conversation: Conversation,
}

impl TurnWorker {
    async fn run(
        mut self,
        mut say_rx: UnboundedReceiver<String>,
        mut events_rx: UnboundedReceiver<TranscriptEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                Some(text) = say_rx.recv() => {
                    let language = self.language();
                    self.speak(text, language).await;
                }
                Some(event) = events_rx.recv() => self.handle_transcript(event).await,
                else => break,
            }
        }
        self.conversation.clear();
        debug!("[session {}] turn worker finished", self.call_id);
    }

    fn language(&self) -> Language {
        lock(&self.state)
            .language
            .unwrap_or(self.config.default_language)
    }

    async fn handle_transcript(&mut self, event: TranscriptEvent) {
        let language = self.language();
        let transcript = match event {
            Ok(transcript) => transcript,
            Err(e) => {
                warn!("[session {}] transcription failed: {}", self.call_id, e);
                self.speak(apology(language).to_string(), language).await;
                return;
            }
        };
        {
            let mut st = lock(&self.state);
            if st.machine.state() != SessionState::Conversing {
                return;
            }
            st.transcript.push(TranscriptEntry {
                text: transcript.text.clone(),
                language: transcript.language,
                at: Utc::now(),
            });
            st.last_activity = Instant::now();
        }
        info!("[session {}] caller said: {}", self.call_id, transcript.text);

        self.conversation.push_user(transcript.text);
        let request = self.llm.generate_answer(
            self.conversation.id().to_string(),
            self.conversation.messages().to_vec(),
        );
        let answer = match timeout(self.config.llm_timeout, request).await {
            Ok(Ok(answer)) => Some(answer),
            Ok(Err(e)) => {
                warn!("[session {}] LLM failed: {}", self.call_id, e);
                None
            }
            Err(_) => {
                warn!(
                    "[session {}] LLM timed out after {:?}",
                    self.call_id, self.config.llm_timeout
                );
                None
            }
        };

        match answer {
            Some(answer) => {
                self.conversation.push_assistant(answer.clone());
                if !self.speak(answer, language).await {
                    self.speak(apology(language).to_string(), language).await;
                }
            }
            None => {
                self.conversation.drop_unanswered();
                self.speak(apology(language).to_string(), language).await;
            }
        }
    }

    /// Synthesizes `text` and queues it for playback. Returns whether audio
    /// was queued.
    async fn speak(&self, text: String, language: Language) -> bool {
        match synthesize_frames(
            self.tts.clone(),
            text,
            language,
            self.config.tts_timeout,
            self.codec,
        )
        .await
        {
            Ok(frames) if frames.is_empty() => false,
            Ok(frames) => self
                .control_tx
                .send(SessionControl::Speak { frames })
                .is_ok(),
            Err(e) => {
                warn!("[session {}] TTS failed: {}", self.call_id, e);
                false
            }
        }
    }
}
