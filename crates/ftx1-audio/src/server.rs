//! The TCP audio streaming server.
//!
//! At most one client session exists at a time: the capture and playback
//! device handles are exclusive, so a second connect attempt is refused
//! with `CONNECT_REJECT(BUSY)`. A connect with no devices configured is
//! refused with `CONNECT_REJECT(REJECTED)`.
//!
//! Session lifecycle: accept, handshake (CONNECT_REQUEST within 10 s),
//! open devices, send AUDIO_CONFIG + CONNECT_ACCEPT, then run four tasks:
//!
//! - **capture**: radio RX frames -> AUDIO_RX frames on the socket
//! - **receive**: socket frames -> TX ring buffer / control handling
//! - **playback**: ring buffer -> playback device, gated on target fill,
//!   one frame of silence per underrun
//! - **stats**: once per second, statistics to subscribers, heartbeats
//!   out, liveness check in

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ftx1_core::error::{Error, Result};

use crate::devices::AudioDeviceFactory;
use crate::protocol::{
    self, ControlMessage, FrameDecodeResult, FrameType, RejectReason, BYTES_PER_FRAME,
    CONNECTION_TIMEOUT, FRAME_MS, HANDSHAKE_TIMEOUT, HEARTBEAT_INTERVAL,
};
use crate::ring::AudioRingBuffer;

/// Default audio listen port.
pub const DEFAULT_PORT: u16 = 4533;

/// PCM byte rate of the fixed stream format (48 kHz x 16-bit x mono).
const BYTES_PER_SECOND: usize = protocol::SAMPLE_RATE as usize * 2;

/// Tuning knobs for the audio server.
#[derive(Debug, Clone)]
pub struct AudioServerConfig {
    /// Playback starts once this much audio is buffered.
    pub target_latency_ms: u32,
    /// Total ring capacity.
    pub buffer_ms: u32,
}

impl Default for AudioServerConfig {
    fn default() -> Self {
        AudioServerConfig {
            target_latency_ms: 100,
            buffer_ms: 500,
        }
    }
}

/// A once-per-second snapshot of session health.
#[derive(Debug, Clone, Default)]
pub struct AudioStreamStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub buffer_fill_percent: u32,
    pub buffer_level_ms: u64,
    pub latency_ms: u64,
    pub underrun_count: u64,
    pub overrun_count: u64,
    pub crc_errors: u64,
    pub connection_age_ms: u64,
    pub streaming: bool,
}

/// Counters shared across the session's tasks.
#[derive(Default)]
struct SessionCounters {
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_sent: AtomicU64,
    crc_errors: AtomicU64,
    latency_ms: AtomicU64,
    /// Milliseconds since session start at the last received frame.
    last_rx_ms: AtomicU64,
}

/// The audio streaming TCP server.
pub struct AudioServer {
    local_addr: std::net::SocketAddr,
    accept_handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    stats_tx: broadcast::Sender<AudioStreamStats>,
}

impl AudioServer {
    /// Bind the listener and start accepting clients.
    ///
    /// With `factory` set to `None`, every client is refused with
    /// `CONNECT_REJECT(REJECTED)` (devices unconfigured).
    pub async fn bind(
        addr: &str,
        factory: Option<Arc<dyn AudioDeviceFactory>>,
        config: AudioServerConfig,
    ) -> Result<AudioServer> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "audio server listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stats_tx, _) = broadcast::channel(16);

        let accept_handle = tokio::spawn(accept_loop(
            listener,
            factory,
            config,
            stats_tx.clone(),
            shutdown_rx,
        ));

        Ok(AudioServer {
            local_addr,
            accept_handle,
            shutdown_tx,
            stats_tx,
        })
    }

    /// The bound listen address (useful when binding port 0).
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Subscribe to once-per-second session statistics.
    pub fn stats_subscribe(&self) -> broadcast::Receiver<AudioStreamStats> {
        self.stats_tx.subscribe()
    }

    /// Stop the server and any active session.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        self.accept_handle.abort();
        let _ = self.accept_handle.await;
        info!("audio server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    factory: Option<Arc<dyn AudioDeviceFactory>>,
    config: AudioServerConfig,
    stats_tx: broadcast::Sender<AudioStreamStats>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let session_active = Arc::new(AtomicBool::new(false));
    let mut client_ids: u64 = 0;

    loop {
        match listener.accept().await {
            Ok((mut socket, peer)) => {
                client_ids += 1;
                let client_id = client_ids;

                if session_active.load(Ordering::Acquire) {
                    info!(client_id, %peer, "audio client refused: busy");
                    reject(&mut socket, RejectReason::Busy).await;
                    continue;
                }

                let factory = match &factory {
                    Some(f) => Arc::clone(f),
                    None => {
                        info!(client_id, %peer, "audio client refused: no devices configured");
                        reject(&mut socket, RejectReason::Rejected).await;
                        continue;
                    }
                };

                info!(client_id, %peer, "audio client connected");
                session_active.store(true, Ordering::Release);

                let active = Arc::clone(&session_active);
                let stats_tx = stats_tx.clone();
                let config = config.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    run_session(socket, client_id, factory, config, stats_tx, shutdown_rx).await;
                    active.store(false, Ordering::Release);
                    info!(client_id, "audio client disconnected");
                });
            }
            Err(e) => {
                warn!(error = %e, "audio accept error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn reject(socket: &mut TcpStream, reason: RejectReason) {
    let frame = ControlMessage::ConnectReject { reason }.to_frame();
    let _ = socket.write_all(&frame).await;
    let _ = socket.shutdown().await;
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

async fn run_session(
    socket: TcpStream,
    client_id: u64,
    factory: Arc<dyn AudioDeviceFactory>,
    config: AudioServerConfig,
    stats_tx: broadcast::Sender<AudioStreamStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let counters = Arc::new(SessionCounters::default());
    let (mut read_half, write_half) = socket.into_split();

    // Outbound frames funnel through one writer task so the capture task
    // and control replies never interleave mid-frame.
    let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(64);
    let writer_handle = tokio::spawn(writer_task(
        write_half,
        outbound_rx,
        Arc::clone(&counters),
    ));

    // Handshake: CONNECT_REQUEST within the window, nothing else.
    let mut inbound_buf: Vec<u8> = Vec::with_capacity(4096);
    let handshake = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        read_one_frame(&mut read_half, &mut inbound_buf, &counters),
    )
    .await;
    match handshake {
        Ok(Ok(Some((FrameType::Control, payload)))) => {
            match ControlMessage::deserialize(&payload) {
                Ok(ControlMessage::ConnectRequest) => {}
                other => {
                    debug!(client_id, ?other, "unexpected handshake message");
                    drop(outbound_tx);
                    let _ = writer_handle.await;
                    return;
                }
            }
        }
        other => {
            debug!(client_id, "handshake failed or timed out ({other:?})");
            drop(outbound_tx);
            let _ = writer_handle.await;
            return;
        }
    }

    // Open the exclusive device handles.
    let handles = match factory.open() {
        Ok(h) => h,
        Err(e) => {
            warn!(client_id, error = %e, "failed to open audio devices");
            let _ = outbound_tx
                .send(
                    ControlMessage::Error {
                        message: format!("failed to open audio devices: {e}"),
                    }
                    .to_frame(),
                )
                .await;
            drop(outbound_tx);
            let _ = writer_handle.await;
            return;
        }
    };

    // Announce the stream format, then accept.
    let _ = outbound_tx
        .send(ControlMessage::audio_config().to_frame())
        .await;
    let _ = outbound_tx.send(ControlMessage::ConnectAccept.to_frame()).await;
    info!(client_id, "audio streaming started");

    let tx_ring = Arc::new(AudioRingBuffer::for_duration(
        BYTES_PER_SECOND,
        config.buffer_ms,
        config.target_latency_ms,
    ));
    let closed = Arc::new(AtomicBool::new(false));

    // Capture task: radio RX frames out to the client.
    let capture_handle = tokio::spawn(capture_task(
        handles.capture_rx,
        outbound_tx.clone(),
        Arc::clone(&closed),
    ));

    // Receive task: client frames in.
    let receive_handle = tokio::spawn(receive_task(
        read_half,
        inbound_buf,
        Arc::clone(&tx_ring),
        outbound_tx.clone(),
        Arc::clone(&counters),
        Arc::clone(&closed),
        started,
    ));

    // Playback task: ring buffer to the device, blocking reads.
    let playback_ring = Arc::clone(&tx_ring);
    let playback_tx = handles.playback_tx.clone();
    let playback_closed = Arc::clone(&closed);
    let playback_handle = tokio::task::spawn_blocking(move || {
        playback_task(playback_ring, playback_tx, playback_closed)
    });

    // Stats / heartbeat / liveness loop.
    counters
        .last_rx_ms
        .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_heartbeat = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if closed.load(Ordering::Acquire) {
                    break;
                }

                let stats = AudioStreamStats {
                    bytes_received: counters.bytes_received.load(Ordering::Relaxed),
                    bytes_sent: counters.bytes_sent.load(Ordering::Relaxed),
                    packets_received: counters.packets_received.load(Ordering::Relaxed),
                    packets_sent: counters.packets_sent.load(Ordering::Relaxed),
                    buffer_fill_percent: tx_ring.fill_percent(),
                    buffer_level_ms: tx_ring.level_ms(BYTES_PER_SECOND),
                    latency_ms: counters.latency_ms.load(Ordering::Relaxed),
                    underrun_count: tx_ring.underrun_count(),
                    overrun_count: tx_ring.overrun_count(),
                    crc_errors: counters.crc_errors.load(Ordering::Relaxed),
                    connection_age_ms: started.elapsed().as_millis() as u64,
                    streaming: true,
                };
                let _ = stats_tx.send(stats);

                if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
                    last_heartbeat = Instant::now();
                    let _ = outbound_tx
                        .send(protocol::encode_frame(FrameType::Heartbeat, &[]))
                        .await;
                    let probe = ControlMessage::LatencyProbe {
                        timestamp_nanos: started.elapsed().as_nanos() as u64,
                    };
                    let _ = outbound_tx.send(probe.to_frame()).await;
                }

                let last_rx = counters.last_rx_ms.load(Ordering::Relaxed);
                let age = started.elapsed().as_millis() as u64;
                if age.saturating_sub(last_rx) > CONNECTION_TIMEOUT.as_millis() as u64 {
                    warn!(client_id, "audio connection timed out");
                    break;
                }
            }

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = outbound_tx.send(ControlMessage::Disconnect.to_frame()).await;
                    break;
                }
            }
        }
    }

    // CLOSING: stop tasks, release devices, drain.
    closed.store(true, Ordering::Release);
    drop(outbound_tx);
    receive_handle.abort();
    capture_handle.abort();
    let _ = receive_handle.await;
    let _ = capture_handle.await;
    let _ = playback_handle.await;
    let _ = writer_handle.await;
    drop(handles.guard);
    debug!(client_id, "audio session closed");
}

/// Serialize all outbound frames onto the socket.
async fn writer_task(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    counters: Arc<SessionCounters>,
) {
    while let Some(frame) = outbound_rx.recv().await {
        if write_half.write_all(&frame).await.is_err() {
            break;
        }
        counters
            .bytes_sent
            .fetch_add(frame.len() as u64, Ordering::Relaxed);
        counters.packets_sent.fetch_add(1, Ordering::Relaxed);
    }
    let _ = write_half.shutdown().await;
}

/// Forward radio RX audio to the client as AUDIO_RX frames.
async fn capture_task(
    mut capture_rx: mpsc::Receiver<Vec<u8>>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    closed: Arc<AtomicBool>,
) {
    while let Some(frame) = capture_rx.recv().await {
        if closed.load(Ordering::Acquire) {
            break;
        }
        if frame.len() != BYTES_PER_FRAME {
            debug!(len = frame.len(), "skipping short capture frame");
            continue;
        }
        let wire = protocol::encode_frame(FrameType::AudioRx, &frame);
        if outbound_tx.send(wire).await.is_err() {
            break;
        }
    }
}

/// Read one complete frame from the socket, counting CRC failures and
/// skipping unknown types. Returns `None` at EOF.
async fn read_one_frame(
    read_half: &mut OwnedReadHalf,
    buf: &mut Vec<u8>,
    counters: &SessionCounters,
) -> Result<Option<(FrameType, Vec<u8>)>> {
    loop {
        match protocol::decode_frame(buf) {
            FrameDecodeResult::Frame {
                frame_type,
                payload,
                consumed,
            } => {
                buf.drain(..consumed);
                return Ok(Some((frame_type, payload)));
            }
            FrameDecodeResult::CrcMismatch { consumed } => {
                buf.drain(..consumed);
                counters.crc_errors.fetch_add(1, Ordering::Relaxed);
                debug!("dropping frame with bad CRC");
            }
            FrameDecodeResult::UnknownType { tag, consumed } => {
                buf.drain(..consumed);
                debug!(tag, "dropping frame with unknown type");
            }
            FrameDecodeResult::Desynchronized => {
                return Err(Error::Protocol("audio stream desynchronized".into()));
            }
            FrameDecodeResult::NeedMore => {
                let mut chunk = [0u8; 4096];
                let n = read_half.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(None);
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

/// Dispatch inbound frames until disconnect, EOF, or a fatal error.
async fn receive_task(
    mut read_half: OwnedReadHalf,
    mut buf: Vec<u8>,
    tx_ring: Arc<AudioRingBuffer>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    counters: Arc<SessionCounters>,
    closed: Arc<AtomicBool>,
    started: Instant,
) {
    loop {
        let frame = match read_one_frame(&mut read_half, &mut buf, &counters).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("audio client closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "audio receive error");
                break;
            }
        };

        counters
            .last_rx_ms
            .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
        counters.packets_received.fetch_add(1, Ordering::Relaxed);

        match frame {
            (FrameType::AudioTx, payload) => {
                if payload.len() != BYTES_PER_FRAME {
                    warn!(
                        len = payload.len(),
                        "AUDIO_TX frame with wrong payload size, closing"
                    );
                    break;
                }
                counters
                    .bytes_received
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
                tx_ring.write(&payload);
            }
            (FrameType::Control, payload) => match ControlMessage::deserialize(&payload) {
                Ok(ControlMessage::LatencyProbe { timestamp_nanos }) => {
                    let reply = ControlMessage::LatencyResponse { timestamp_nanos };
                    if outbound_tx.send(reply.to_frame()).await.is_err() {
                        break;
                    }
                }
                Ok(ControlMessage::LatencyResponse { timestamp_nanos }) => {
                    let now = started.elapsed().as_nanos() as u64;
                    let rtt_ms = now.saturating_sub(timestamp_nanos) / 1_000_000;
                    counters.latency_ms.store(rtt_ms / 2, Ordering::Relaxed);
                }
                Ok(ControlMessage::Disconnect) => {
                    debug!("client requested disconnect");
                    break;
                }
                Ok(ControlMessage::Error { message }) => {
                    warn!(%message, "client reported error");
                }
                Ok(other) => {
                    debug!(?other, "ignoring control message");
                }
                Err(e) => {
                    debug!(error = %e, "undecodable control message");
                }
            },
            // Liveness only; receipt already refreshed the timer.
            (FrameType::Heartbeat, _) | (FrameType::HeartbeatAck, _) => {}
            (FrameType::AudioRx, _) => {
                debug!("ignoring AUDIO_RX from client");
            }
        }
    }

    closed.store(true, Ordering::Release);
}

/// Drain the TX ring into the playback device at frame cadence, inserting
/// silence on underrun. Runs on the blocking pool.
fn playback_task(
    ring: Arc<AudioRingBuffer>,
    playback_tx: mpsc::Sender<Vec<u8>>,
    closed: Arc<AtomicBool>,
) {
    // Startup gating: wait for the ring to reach its target fill.
    while !ring.has_reached_target() {
        if closed.load(Ordering::Acquire) {
            return;
        }
        ring.wait_for_target(Duration::from_millis(50));
    }

    let read_timeout = Duration::from_millis(FRAME_MS as u64 * 2);
    let mut frame = vec![0u8; BYTES_PER_FRAME];

    while !closed.load(Ordering::Acquire) {
        let n = ring.read(&mut frame, read_timeout);
        let out = if n == 0 {
            // Underrun: one frame of silence keeps the device fed.
            vec![0u8; BYTES_PER_FRAME]
        } else {
            frame[..n].to_vec()
        };
        if playback_tx.blocking_send(out).is_err() {
            break;
        }
    }
}
