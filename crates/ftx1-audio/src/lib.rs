//! ftx1-audio: the bidirectional audio bridge.
//!
//! - [`protocol`] -- the framed TCP wire format (type, length, payload,
//!   CRC-32) and control messages
//! - [`ring`] -- the jitter-absorbing ring buffer with target-fill gating
//! - [`devices`] -- cpal capture/playback bridged to frame channels
//! - [`server`] -- the single-session streaming server
//!
//! The stream format is fixed at 48 kHz / 16-bit / mono / 20 ms frames so
//! that WSJT-X and similar clients work without negotiation.

pub mod devices;
pub mod protocol;
pub mod ring;
pub mod server;

pub use devices::{
    list_audio_devices, AudioDeviceFactory, AudioDeviceHandles, AudioDeviceInfo,
    CpalDeviceFactory, DeviceGuard,
};
pub use protocol::{ControlMessage, FrameType, RejectReason};
pub use ring::AudioRingBuffer;
pub use server::{AudioServer, AudioServerConfig, AudioStreamStats, DEFAULT_PORT};
