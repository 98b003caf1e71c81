//! cpal-backed audio devices for the bridge.
//!
//! cpal drives a callback on a high-priority audio thread; this module
//! bridges that model to channels of fixed 20 ms frames:
//!
//! - **Capture** (radio RX): cpal input callback accumulates samples and
//!   pushes complete [`BYTES_PER_FRAME`] frames into an `mpsc` channel.
//! - **Playback** (radio TX): the session sends frames into an `mpsc`
//!   channel; a bridge thread feeds a byte queue that the cpal output
//!   callback drains, padding with silence when the queue runs dry.
//!
//! Each stream lives on its own OS thread because `cpal::Stream` is not
//! `Send`; dropping the returned [`DeviceGuard`] stops both threads.
//!
//! The server itself never touches cpal: it consumes an
//! [`AudioDeviceFactory`], so tests substitute plain channels.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ftx1_core::error::{Error, Result};

use crate::protocol::{BYTES_PER_FRAME, SAMPLE_RATE};

/// Channel capacity for capture/playback frame channels: enough to absorb
/// scheduling jitter (~640 ms of 20 ms frames) without unbounded memory.
const FRAME_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Device enumeration
// ---------------------------------------------------------------------------

/// Information about an available audio device.
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    /// Device name as reported by the OS audio subsystem. The FTX-1's USB
    /// interface typically shows up as "USB Audio CODEC".
    pub name: String,
    /// Whether this device supports capture.
    pub is_input: bool,
    /// Whether this device supports playback.
    pub is_output: bool,
}

/// List all audio input and output devices on the default host.
pub fn list_audio_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();

    let mut input_names = std::collections::HashSet::new();
    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                input_names.insert(name);
            }
        }
    }

    let mut output_names = std::collections::HashSet::new();
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                output_names.insert(name);
            }
        }
    }

    let mut all: Vec<String> = input_names.union(&output_names).cloned().collect();
    all.sort();

    Ok(all
        .into_iter()
        .map(|name| AudioDeviceInfo {
            is_input: input_names.contains(&name),
            is_output: output_names.contains(&name),
            name,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Device handles and factory
// ---------------------------------------------------------------------------

/// Stops the device threads when dropped.
pub struct DeviceGuard {
    stop: Arc<AtomicBool>,
}

impl DeviceGuard {
    /// A guard with no device threads behind it, for factories that wire
    /// the channels to something other than cpal.
    pub fn detached() -> DeviceGuard {
        DeviceGuard {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Open capture and playback endpoints for one audio session.
///
/// `capture_rx` yields complete [`BYTES_PER_FRAME`] frames of radio RX
/// audio; frames of TX audio sent into `playback_tx` reach the radio.
pub struct AudioDeviceHandles {
    pub capture_rx: mpsc::Receiver<Vec<u8>>,
    pub playback_tx: mpsc::Sender<Vec<u8>>,
    pub guard: DeviceGuard,
}

/// Opens exclusive audio device handles for a session.
///
/// The server calls [`open`](AudioDeviceFactory::open) once per accepted
/// session and drops the handles when the session closes, releasing the
/// devices for the next client.
pub trait AudioDeviceFactory: Send + Sync {
    fn open(&self) -> Result<AudioDeviceHandles>;
}

/// The production factory: opens cpal devices by (substring) name.
pub struct CpalDeviceFactory {
    capture_name: String,
    playback_name: String,
}

impl CpalDeviceFactory {
    pub fn new(capture_name: impl Into<String>, playback_name: impl Into<String>) -> Self {
        CpalDeviceFactory {
            capture_name: capture_name.into(),
            playback_name: playback_name.into(),
        }
    }
}

impl AudioDeviceFactory for CpalDeviceFactory {
    fn open(&self) -> Result<AudioDeviceHandles> {
        let stop = Arc::new(AtomicBool::new(false));

        let (capture_tx, capture_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (playback_tx, playback_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        start_capture_thread(&self.capture_name, capture_tx, Arc::clone(&stop))?;
        start_playback_thread(&self.playback_name, playback_rx, Arc::clone(&stop))?;

        Ok(AudioDeviceHandles {
            capture_rx,
            playback_tx,
            guard: DeviceGuard { stop },
        })
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

fn find_input_device(name: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();
    host.input_devices()
        .map_err(|e| Error::Transport(format!("cannot enumerate input devices: {e}")))?
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&name.to_lowercase()))
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::Transport(format!("capture device not found: {name}")))
}

fn find_output_device(name: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();
    host.output_devices()
        .map_err(|e| Error::Transport(format!("cannot enumerate output devices: {e}")))?
        .find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&name.to_lowercase()))
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::Transport(format!("playback device not found: {name}")))
}

fn stream_config() -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    }
}

/// Spawn the thread that owns the cpal input stream.
///
/// Device lookup and probing happen on the calling thread so open errors
/// surface synchronously; the stream itself is built on the dedicated
/// thread because `cpal::Stream` is not `Send`.
fn start_capture_thread(
    device_name: &str,
    frames_tx: mpsc::Sender<Vec<u8>>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    // Fail fast if the device is missing.
    let _ = find_input_device(device_name)?;
    let device_name = device_name.to_string();

    std::thread::Builder::new()
        .name("audio-capture".into())
        .spawn(move || {
            let device = match find_input_device(&device_name) {
                Ok(d) => d,
                Err(e) => {
                    error!(error = %e, "capture device disappeared");
                    return;
                }
            };

            // Accumulate callback buffers into fixed 20 ms frames.
            let mut pending: Vec<u8> = Vec::with_capacity(BYTES_PER_FRAME * 2);
            let tx = frames_tx.clone();
            let stream = device.build_input_stream(
                &stream_config(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for sample in data {
                        pending.extend_from_slice(&sample.to_le_bytes());
                    }
                    while pending.len() >= BYTES_PER_FRAME {
                        let frame: Vec<u8> = pending.drain(..BYTES_PER_FRAME).collect();
                        // Never block the audio thread; a full channel
                        // means the network side is behind, drop the frame.
                        if tx.try_send(frame).is_err() {
                            debug!("capture channel full, dropping frame");
                        }
                    }
                },
                |e| error!(error = %e, "capture stream error"),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to build capture stream");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!(error = %e, "failed to start capture stream");
                return;
            }
            info!(device = %device_name, "capture stream running");

            while !stop.load(Ordering::Relaxed) && !frames_tx.is_closed() {
                std::thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
            debug!("capture stream stopped");
        })
        .map_err(|e| Error::Transport(format!("failed to spawn capture thread: {e}")))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Spawn the thread that owns the cpal output stream and drains the
/// playback frame channel into it.
fn start_playback_thread(
    device_name: &str,
    mut frames_rx: mpsc::Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let _ = find_output_device(device_name)?;
    let device_name = device_name.to_string();

    std::thread::Builder::new()
        .name("audio-playback".into())
        .spawn(move || {
            let device = match find_output_device(&device_name) {
                Ok(d) => d,
                Err(e) => {
                    error!(error = %e, "playback device disappeared");
                    return;
                }
            };

            // Bytes queued for the output callback.
            let queue: Arc<Mutex<VecDeque<u8>>> = Arc::new(Mutex::new(VecDeque::new()));
            let callback_queue = Arc::clone(&queue);

            let stream = device.build_output_stream(
                &stream_config(),
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut queue = callback_queue.lock().unwrap();
                    for sample in data.iter_mut() {
                        *sample = match (queue.pop_front(), queue.pop_front()) {
                            (Some(lo), Some(hi)) => i16::from_le_bytes([lo, hi]),
                            // Queue dry: play silence.
                            _ => 0,
                        };
                    }
                },
                |e| error!(error = %e, "playback stream error"),
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to build playback stream");
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!(error = %e, "failed to start playback stream");
                return;
            }
            info!(device = %device_name, "playback stream running");

            while !stop.load(Ordering::Relaxed) {
                match frames_rx.blocking_recv() {
                    Some(frame) => {
                        let mut queue = queue.lock().unwrap();
                        // Bound the queue to keep device latency in check.
                        if queue.len() > BYTES_PER_FRAME * 16 {
                            warn!("playback queue overfull, dropping oldest");
                            let excess = queue.len() - BYTES_PER_FRAME * 16;
                            queue.drain(..excess);
                        }
                        queue.extend(frame);
                    }
                    None => break,
                }
            }
            drop(stream);
            debug!("playback stream stopped");
        })
        .map_err(|e| Error::Transport(format!("failed to spawn playback thread: {e}")))?;

    Ok(())
}
