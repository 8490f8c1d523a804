//! Per-call RTP transport: one UDP socket, an independent receive loop and
//! send loop, and a bounded outbound payload queue.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::RtpError;
use crate::media::{chunk_wire_frames, FRAME_DURATION_MS};
use crate::rtp::codec::Codec;
use crate::rtp::dtmf::generate_dtmf;
use crate::rtp::packet::RtpPacket;
use crate::rtp::parser::parse_rtp_packet;
use crate::rtp::stream::{RtpStreamState, TIMESTAMP_STEP};

const RECV_BUFFER_LEN: usize = 2048;

/// Invoked on the receive loop for every well-formed packet. Must not block.
pub type AudioCallback = Arc<dyn Fn(&RtpPacket) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RtpEngineConfig {
    pub bind_ip: IpAddr,
    pub codec: Codec,
    pub send_queue: usize,
    pub join_timeout: Duration,
}

impl Default for RtpEngineConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            codec: Codec::Pcmu,
            send_queue: 256,
            join_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RtpStats {
    pub local_addr: Option<String>,
    pub remote_addr: Option<String>,
    pub running: bool,
    pub ssrc: u32,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub malformed_packets: u64,
    pub dropped_payloads: u64,
}

#[derive(Default)]
struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
}

struct Shared {
    remote: RwLock<Option<SocketAddr>>,
    callback: RwLock<Option<AudioCallback>>,
    running: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn remote(&self) -> Option<SocketAddr> {
        *self.remote.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn callback(&self) -> Option<AudioCallback> {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct Running {
    local_addr: SocketAddr,
    outbound: mpsc::Sender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
    rx_task: JoinHandle<()>,
    tx_task: JoinHandle<()>,
}

pub struct RtpEngine {
    config: RtpEngineConfig,
    ssrc: u32,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl RtpEngine {
    pub fn new(config: RtpEngineConfig) -> Self {
        Self {
            config,
            ssrc: rand::random(),
            shared: Arc::new(Shared {
                remote: RwLock::new(None),
                callback: RwLock::new(None),
                running: AtomicBool::new(false),
                counters: Counters::default(),
            }),
            running: Mutex::new(None),
        }
    }

    pub fn codec(&self) -> Codec {
        self.config.codec
    }

    /// Binds `bind_ip:local_port` (0 picks an ephemeral port) and spawns the
    /// receive and send loops. Returns the bound address.
    pub async fn start(
        &self,
        local_port: u16,
        remote: Option<SocketAddr>,
    ) -> Result<SocketAddr, RtpError> {
        if self.lock_running().is_some() {
            return Err(RtpError::AlreadyStarted);
        }

        let addr = SocketAddr::new(self.config.bind_ip, local_port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| RtpError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        if let Some(remote) = remote {
            self.set_remote(remote);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.send_queue.max(1));

        let mut guard = self.lock_running();
        if guard.is_some() {
            return Err(RtpError::AlreadyStarted);
        }

        let rx_task = tokio::spawn(run_rx(
            socket.clone(),
            self.shared.clone(),
            shutdown_rx.clone(),
        ));
        let stream = RtpStreamState::new(self.ssrc, rand::random(), rand::random());
        let tx_task = tokio::spawn(run_tx(
            socket,
            self.shared.clone(),
            outbound_rx,
            shutdown_rx,
            stream,
            self.config.codec.payload_type(),
        ));
        self.shared.running.store(true, Ordering::SeqCst);
        *guard = Some(Running {
            local_addr,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            rx_task,
            tx_task,
        });
        info!(
            "[rtp] engine started on {} (ssrc={:#010x} codec={:?})",
            local_addr, self.ssrc, self.config.codec
        );
        Ok(local_addr)
    }

    /// Stops both loops and releases the socket. Safe to call repeatedly and
    /// from any task.
    pub async fn stop(&self) {
        let taken = self.lock_running().take();
        let Some(running) = taken else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = running.shutdown.send(true);
        drop(running.outbound);

        let timeout = self.config.join_timeout;
        join_bounded(running.rx_task, timeout, "rx").await;
        join_bounded(running.tx_task, timeout, "tx").await;
        info!("[rtp] engine on {} stopped", running.local_addr);
    }

    pub fn set_remote(&self, remote: SocketAddr) {
        *self
            .shared
            .remote
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(remote);
        debug!("[rtp] remote endpoint set to {}", remote);
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.shared.remote()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|r| r.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn set_audio_callback(&self, callback: AudioCallback) {
        *self
            .shared
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn clear_audio_callback(&self) {
        *self
            .shared
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Queues one payload for the send loop. Never blocks: with no remote
    /// endpoint the payload is discarded, and a full queue drops it.
    /// Returns whether the payload was queued.
    pub fn send_audio(&self, payload: Vec<u8>) -> bool {
        if self.shared.remote().is_none() {
            debug!("[rtp tx] no remote endpoint, discarding {} bytes", payload.len());
            return false;
        }
        let guard = self.lock_running();
        let Some(running) = guard.as_ref() else {
            debug!("[rtp tx] engine not running, discarding payload");
            return false;
        };
        match running.outbound.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "[rtp tx] send queue full, dropping payload (dropped total={})",
                    dropped
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Plays a keypad digit as in-band tones, one frame every 20ms.
    /// Returns `false` for characters that are not DTMF digits.
    pub async fn send_dtmf(&self, digit: char, duration: Duration) -> bool {
        let Some(mulaw) = generate_dtmf(digit, duration, 8000) else {
            warn!("[rtp tx] ignoring invalid DTMF digit {:?}", digit);
            return false;
        };
        let codec = self.config.codec;
        let frames = chunk_wire_frames(&codec.from_mulaw(&mulaw), codec.silence_byte());
        let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));
        for frame in frames {
            ticker.tick().await;
            if !self.is_running() {
                break;
            }
            self.send_audio(frame);
        }
        true
    }

    pub fn stats(&self) -> RtpStats {
        let counters = &self.shared.counters;
        RtpStats {
            local_addr: self.local_addr().map(|a| a.to_string()),
            remote_addr: self.remote().map(|a| a.to_string()),
            running: self.is_running(),
            ssrc: self.ssrc,
            packets_sent: counters.sent.load(Ordering::Relaxed),
            packets_received: counters.received.load(Ordering::Relaxed),
            malformed_packets: counters.malformed.load(Ordering::Relaxed),
            dropped_payloads: counters.dropped.load(Ordering::Relaxed),
        }
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RtpEngine {
    fn drop(&mut self) {
        if let Some(running) = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = running.shutdown.send(true);
            running.rx_task.abort();
            running.tx_task.abort();
        }
    }
}

async fn join_bounded(mut task: JoinHandle<()>, timeout: Duration, name: &str) {
    if tokio::time::timeout(timeout, &mut task).await.is_err() {
        warn!("[rtp] {} loop did not stop within {:?}, aborting", name, timeout);
        task.abort();
    }
}

async fn run_rx(socket: Arc<UdpSocket>, shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            res = socket.recv_from(&mut buf) => match res {
                Ok((len, src)) => handle_datagram(&shared, &buf[..len], src),
                Err(e) => {
                    if *shutdown.borrow() {
                        break;
                    }
                    warn!("[rtp rx] recv error: {}", e);
                }
            }
        }
    }
    debug!("[rtp rx] loop finished");
}

fn handle_datagram(shared: &Shared, data: &[u8], src: SocketAddr) {
    let pkt = match parse_rtp_packet(data) {
        Ok(pkt) => pkt,
        Err(e) => {
            shared.counters.malformed.fetch_add(1, Ordering::Relaxed);
            warn!("[rtp rx] malformed packet from {}: {}", src, e);
            return;
        }
    };
    shared.counters.received.fetch_add(1, Ordering::Relaxed);
    debug!(
        "[rtp rx] len={} from {} pt={} seq={} ts={}",
        data.len(),
        src,
        pkt.payload_type,
        pkt.sequence_number,
        pkt.timestamp
    );
    if pkt.payload.is_empty() {
        return;
    }
    if let Some(callback) = shared.callback() {
        callback(&pkt);
    }
}

async fn run_tx(
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
    mut stream: RtpStreamState,
    payload_type: u8,
) {
    loop {
        let payload = tokio::select! {
            _ = shutdown.changed() => break,
            next = outbound.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };
        let Some(remote) = shared.remote() else {
            continue;
        };
        let bytes = stream.packet(payload_type, payload).to_bytes();
        match socket.send_to(&bytes, remote).await {
            Ok(_) => {
                stream.advance(TIMESTAMP_STEP);
                shared.counters.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                if *shutdown.borrow() {
                    break;
                }
                warn!("[rtp tx] send to {} failed: {}", remote, e);
            }
        }
    }
    debug!("[rtp tx] loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn loopback_config() -> RtpEngineConfig {
        RtpEngineConfig {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..RtpEngineConfig::default()
        }
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let engine = RtpEngine::new(loopback_config());
        engine.start(0, None).await.unwrap();
        assert!(matches!(
            engine.start(0, None).await,
            Err(RtpError::AlreadyStarted)
        ));
        engine.stop().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let engine = RtpEngine::new(loopback_config());
        assert!(matches!(
            engine.start(port, None).await,
            Err(RtpError::Bind { .. })
        ));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let engine = RtpEngine::new(loopback_config());
        engine.stop().await;
        engine.start(0, None).await.unwrap();
        engine.stop().await;
        engine.stop().await;
        assert!(!engine.is_running());
        assert!(engine.local_addr().is_none());
    }

    #[tokio::test]
    async fn malformed_datagrams_are_counted_and_skipped() {
        let engine = RtpEngine::new(loopback_config());
        let local = engine.start(0, None).await.unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        engine.set_audio_callback(Arc::new(move |pkt: &RtpPacket| {
            assert_eq!(pkt.payload.len(), 160);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(&[0x80, 0x00, 0x01], local).await.unwrap();
        let good = RtpPacket::new(0, 1, 160, 9, vec![0xFF; 160]).to_bytes();
        peer.send_to(&good, local).await.unwrap();

        for _ in 0..100 {
            if hits.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stats = engine.stats();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(stats.malformed_packets, 1);
        assert_eq!(stats.packets_received, 1);
        engine.stop().await;
    }

    #[tokio::test]
    async fn full_queue_drops_newest() {
        let engine = RtpEngine::new(RtpEngineConfig {
            send_queue: 1,
            ..loopback_config()
        });
        engine.start(0, None).await.unwrap();
        engine.set_remote("127.0.0.1:9".parse().unwrap());
        // current-thread runtime: the send loop cannot drain between these calls
        assert!(engine.send_audio(vec![0xFF; 160]));
        assert!(!engine.send_audio(vec![0xFF; 160]));
        assert_eq!(engine.stats().dropped_payloads, 1);
        engine.stop().await;
    }

    #[tokio::test]
    async fn dtmf_frames_are_paced_and_padded() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let engine = RtpEngine::new(loopback_config());
        engine
            .start(0, Some(peer.local_addr().unwrap()))
            .await
            .unwrap();
        assert!(engine.send_dtmf('7', Duration::from_millis(50)).await);
        assert!(!engine.send_dtmf('x', Duration::from_millis(50)).await);

        let mut buf = [0u8; 512];
        let mut sizes = Vec::new();
        let mut last = Vec::new();
        for _ in 0..3 {
            let (len, _) = tokio::time::timeout(Duration::from_secs(1), peer.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            sizes.push(len);
            last = buf[..len].to_vec();
        }
        assert_eq!(sizes, vec![172, 172, 172]);
        // 400 samples: the third frame carries 80 samples of tone then silence
        assert!(last[12 + 80..].iter().all(|&b| b == 0xFF));
        engine.stop().await;
    }
}
