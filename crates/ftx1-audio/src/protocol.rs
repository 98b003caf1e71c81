//! The framed TCP audio protocol.
//!
//! Wire format: `[type:1][length:2 big-endian][payload:length][crc32:4]`.
//! The CRC is computed over `type | length | payload`. A frame that fails
//! its CRC is dropped (and counted) without killing the session; a length
//! field beyond [`MAX_PAYLOAD_LEN`] means the stream is desynchronized and
//! the session must close.
//!
//! The audio format is fixed for interoperability with WSJT-X and friends:
//! 48 kHz, signed 16-bit little-endian PCM, mono, 20 ms frames.

use ftx1_core::error::{Error, Result};

// ---------------------------------------------------------------------------
// Fixed audio format
// ---------------------------------------------------------------------------

/// Sample rate in hertz.
pub const SAMPLE_RATE: u32 = 48_000;
/// Bits per sample (signed, little-endian).
pub const BITS_PER_SAMPLE: u8 = 16;
/// Channel count (mono).
pub const CHANNELS: u8 = 1;
/// Frame duration in milliseconds.
pub const FRAME_MS: u8 = 20;
/// Samples per audio frame (48 kHz x 20 ms).
pub const SAMPLES_PER_FRAME: usize = 960;
/// Payload bytes per AUDIO_RX / AUDIO_TX frame.
pub const BYTES_PER_FRAME: usize = SAMPLES_PER_FRAME * 2;

/// Sanity bound on the frame length field; anything larger means the
/// stream is desynchronized.
pub const MAX_PAYLOAD_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How often the server emits a heartbeat frame.
pub const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
/// Close the session when nothing is received for this long.
pub const CONNECTION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);
/// The client must complete the handshake within this window.
pub const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Frame types
// ---------------------------------------------------------------------------

/// Audio protocol frame type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// A serialized [`ControlMessage`].
    Control,
    /// Radio RX audio, server to client.
    AudioRx,
    /// Client TX audio, client to server.
    AudioTx,
    /// Liveness probe.
    Heartbeat,
    /// Liveness reply.
    HeartbeatAck,
}

impl FrameType {
    /// The wire tag byte.
    pub fn tag(&self) -> u8 {
        match self {
            FrameType::Control => 1,
            FrameType::AudioRx => 2,
            FrameType::AudioTx => 3,
            FrameType::Heartbeat => 4,
            FrameType::HeartbeatAck => 5,
        }
    }

    /// Parse a wire tag byte.
    pub fn from_tag(tag: u8) -> Option<FrameType> {
        Some(match tag {
            1 => FrameType::Control,
            2 => FrameType::AudioRx,
            3 => FrameType::AudioTx,
            4 => FrameType::Heartbeat,
            5 => FrameType::HeartbeatAck,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Frame codec
// ---------------------------------------------------------------------------

/// Encode one frame, CRC included.
pub fn encode_frame(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);

    let mut out = Vec::with_capacity(3 + payload.len() + 4);
    out.push(frame_type.tag());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&out);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
    out
}

/// Result of attempting to decode one frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDecodeResult {
    /// A complete, CRC-valid frame.
    Frame {
        frame_type: FrameType,
        payload: Vec<u8>,
        consumed: usize,
    },
    /// A complete frame whose CRC did not match; drop it and count it.
    CrcMismatch { consumed: usize },
    /// A complete frame with an unknown type tag; drop it.
    UnknownType { tag: u8, consumed: usize },
    /// The length field exceeds [`MAX_PAYLOAD_LEN`]; the stream is
    /// desynchronized and the session must close.
    Desynchronized,
    /// Not enough bytes buffered yet.
    NeedMore,
}

/// Decode one frame from the front of `buf`.
pub fn decode_frame(buf: &[u8]) -> FrameDecodeResult {
    if buf.len() < 3 {
        return FrameDecodeResult::NeedMore;
    }

    let tag = buf[0];
    let len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
    if len > MAX_PAYLOAD_LEN {
        return FrameDecodeResult::Desynchronized;
    }

    let total = 3 + len + 4;
    if buf.len() < total {
        return FrameDecodeResult::NeedMore;
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[..3 + len]);
    let expected = hasher.finalize();
    let actual = u32::from_be_bytes([
        buf[3 + len],
        buf[3 + len + 1],
        buf[3 + len + 2],
        buf[3 + len + 3],
    ]);
    if expected != actual {
        return FrameDecodeResult::CrcMismatch { consumed: total };
    }

    match FrameType::from_tag(tag) {
        Some(frame_type) => FrameDecodeResult::Frame {
            frame_type,
            payload: buf[3..3 + len].to_vec(),
            consumed: total,
        },
        None => FrameDecodeResult::UnknownType {
            tag,
            consumed: total,
        },
    }
}

// ---------------------------------------------------------------------------
// Control messages
// ---------------------------------------------------------------------------

/// Why a connection attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another client already holds the audio session.
    Busy,
    /// The server has no audio devices configured.
    Rejected,
}

impl RejectReason {
    fn tag(&self) -> u8 {
        match self {
            RejectReason::Busy => 1,
            RejectReason::Rejected => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<RejectReason> {
        Some(match tag {
            1 => RejectReason::Busy,
            2 => RejectReason::Rejected,
            _ => return None,
        })
    }
}

/// Control messages carried in [`FrameType::Control`] payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Client asks to start a session.
    ConnectRequest,
    /// Server accepts; streaming begins.
    ConnectAccept,
    /// Server refuses the connection.
    ConnectReject { reason: RejectReason },
    /// Server announces the fixed stream format.
    AudioConfig {
        sample_rate: u32,
        bits_per_sample: u8,
        channels: u8,
        frame_ms: u8,
    },
    /// Either side ends the session.
    Disconnect,
    /// Round-trip probe carrying the sender's timestamp.
    LatencyProbe { timestamp_nanos: u64 },
    /// Echo of a probe, same timestamp.
    LatencyResponse { timestamp_nanos: u64 },
    /// Human-readable fault report.
    Error { message: String },
}

impl ControlMessage {
    /// The [`AudioConfig`](ControlMessage::AudioConfig) for the fixed
    /// stream format.
    pub fn audio_config() -> ControlMessage {
        ControlMessage::AudioConfig {
            sample_rate: SAMPLE_RATE,
            bits_per_sample: BITS_PER_SAMPLE,
            channels: CHANNELS,
            frame_ms: FRAME_MS,
        }
    }

    /// Serialize to the CONTROL payload form.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            ControlMessage::ConnectRequest => vec![1],
            ControlMessage::ConnectAccept => vec![2],
            ControlMessage::ConnectReject { reason } => vec![3, reason.tag()],
            ControlMessage::AudioConfig {
                sample_rate,
                bits_per_sample,
                channels,
                frame_ms,
            } => {
                let mut out = Vec::with_capacity(8);
                out.push(4);
                out.extend_from_slice(&sample_rate.to_be_bytes());
                out.push(*bits_per_sample);
                out.push(*channels);
                out.push(*frame_ms);
                out
            }
            ControlMessage::Disconnect => vec![5],
            ControlMessage::LatencyProbe { timestamp_nanos } => {
                let mut out = Vec::with_capacity(9);
                out.push(6);
                out.extend_from_slice(&timestamp_nanos.to_be_bytes());
                out
            }
            ControlMessage::LatencyResponse { timestamp_nanos } => {
                let mut out = Vec::with_capacity(9);
                out.push(7);
                out.extend_from_slice(&timestamp_nanos.to_be_bytes());
                out
            }
            ControlMessage::Error { message } => {
                let mut out = Vec::with_capacity(1 + message.len());
                out.push(8);
                out.extend_from_slice(message.as_bytes());
                out
            }
        }
    }

    /// Deserialize from a CONTROL payload.
    pub fn deserialize(payload: &[u8]) -> Result<ControlMessage> {
        let (&tag, body) = payload
            .split_first()
            .ok_or_else(|| Error::Protocol("empty control message".into()))?;

        Ok(match tag {
            1 => ControlMessage::ConnectRequest,
            2 => ControlMessage::ConnectAccept,
            3 => {
                let reason_tag = *body
                    .first()
                    .ok_or_else(|| Error::Protocol("truncated CONNECT_REJECT".into()))?;
                let reason = RejectReason::from_tag(reason_tag).ok_or_else(|| {
                    Error::Protocol(format!("unknown reject reason: {reason_tag}"))
                })?;
                ControlMessage::ConnectReject { reason }
            }
            4 => {
                if body.len() != 7 {
                    return Err(Error::Protocol("truncated AUDIO_CONFIG".into()));
                }
                ControlMessage::AudioConfig {
                    sample_rate: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
                    bits_per_sample: body[4],
                    channels: body[5],
                    frame_ms: body[6],
                }
            }
            5 => ControlMessage::Disconnect,
            6 | 7 => {
                if body.len() != 8 {
                    return Err(Error::Protocol("truncated latency message".into()));
                }
                let timestamp_nanos = u64::from_be_bytes([
                    body[0], body[1], body[2], body[3], body[4], body[5], body[6], body[7],
                ]);
                if tag == 6 {
                    ControlMessage::LatencyProbe { timestamp_nanos }
                } else {
                    ControlMessage::LatencyResponse { timestamp_nanos }
                }
            }
            8 => ControlMessage::Error {
                message: String::from_utf8_lossy(body).into_owned(),
            },
            _ => {
                return Err(Error::Protocol(format!(
                    "unknown control message type: {tag}"
                )));
            }
        })
    }

    /// Encode this control message as a complete CONTROL frame.
    pub fn to_frame(&self) -> Vec<u8> {
        encode_frame(FrameType::Control, &self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_constants_agree() {
        assert_eq!(
            BYTES_PER_FRAME,
            (SAMPLE_RATE as usize / 1000) * FRAME_MS as usize * 2
        );
        assert_eq!(BYTES_PER_FRAME, 1920);
        assert_eq!(SAMPLES_PER_FRAME, 960);
    }

    #[test]
    fn frame_type_round_trip() {
        for ty in [
            FrameType::Control,
            FrameType::AudioRx,
            FrameType::AudioTx,
            FrameType::Heartbeat,
            FrameType::HeartbeatAck,
        ] {
            assert_eq!(FrameType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(FrameType::from_tag(0), None);
        assert_eq!(FrameType::from_tag(6), None);
    }

    #[test]
    fn frame_encode_decode() {
        let payload = vec![0x11u8; 64];
        let wire = encode_frame(FrameType::AudioTx, &payload);
        assert_eq!(wire.len(), 3 + 64 + 4);
        assert_eq!(wire[0], 3);
        assert_eq!(u16::from_be_bytes([wire[1], wire[2]]), 64);

        match decode_frame(&wire) {
            FrameDecodeResult::Frame {
                frame_type,
                payload: decoded,
                consumed,
            } => {
                assert_eq!(frame_type, FrameType::AudioTx);
                assert_eq!(decoded, payload);
                assert_eq!(consumed, wire.len());
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn decode_needs_full_frame() {
        let wire = encode_frame(FrameType::Heartbeat, &[]);
        assert_eq!(decode_frame(&wire[..2]), FrameDecodeResult::NeedMore);
        assert_eq!(
            decode_frame(&wire[..wire.len() - 1]),
            FrameDecodeResult::NeedMore
        );
    }

    #[test]
    fn decode_detects_crc_mismatch() {
        let mut wire = encode_frame(FrameType::AudioTx, &[1, 2, 3, 4]);
        // Flip a payload bit.
        wire[4] ^= 0x01;
        assert_eq!(
            decode_frame(&wire),
            FrameDecodeResult::CrcMismatch {
                consumed: wire.len()
            }
        );
    }

    #[test]
    fn decode_detects_unknown_type() {
        let mut wire = encode_frame(FrameType::Control, &[1]);
        wire[0] = 9;
        // Recompute the CRC so only the type is wrong.
        let body_len = wire.len() - 4;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&wire[..body_len]);
        let crc = hasher.finalize().to_be_bytes();
        wire[body_len..].copy_from_slice(&crc);

        assert_eq!(
            decode_frame(&wire),
            FrameDecodeResult::UnknownType {
                tag: 9,
                consumed: wire.len()
            }
        );
    }

    #[test]
    fn decode_rejects_oversize_length() {
        let buf = [1u8, 0xFF, 0xFF, 0, 0];
        assert_eq!(decode_frame(&buf), FrameDecodeResult::Desynchronized);
    }

    #[test]
    fn decode_consecutive_frames() {
        let mut wire = encode_frame(FrameType::Heartbeat, &[]);
        wire.extend_from_slice(&encode_frame(FrameType::HeartbeatAck, &[]));

        match decode_frame(&wire) {
            FrameDecodeResult::Frame {
                frame_type,
                consumed,
                ..
            } => {
                assert_eq!(frame_type, FrameType::Heartbeat);
                match decode_frame(&wire[consumed..]) {
                    FrameDecodeResult::Frame { frame_type, .. } => {
                        assert_eq!(frame_type, FrameType::HeartbeatAck);
                    }
                    other => panic!("expected second frame, got {other:?}"),
                }
            }
            other => panic!("expected first frame, got {other:?}"),
        }
    }

    #[test]
    fn control_message_round_trips() {
        let messages = [
            ControlMessage::ConnectRequest,
            ControlMessage::ConnectAccept,
            ControlMessage::ConnectReject {
                reason: RejectReason::Busy,
            },
            ControlMessage::ConnectReject {
                reason: RejectReason::Rejected,
            },
            ControlMessage::audio_config(),
            ControlMessage::Disconnect,
            ControlMessage::LatencyProbe {
                timestamp_nanos: 123_456_789_000,
            },
            ControlMessage::LatencyResponse {
                timestamp_nanos: u64::MAX,
            },
            ControlMessage::Error {
                message: "failed to open audio devices".into(),
            },
        ];
        for msg in messages {
            let decoded = ControlMessage::deserialize(&msg.serialize()).unwrap();
            assert_eq!(decoded, msg, "round-trip failed for {msg:?}");
        }
    }

    #[test]
    fn audio_config_carries_fixed_format() {
        match ControlMessage::audio_config() {
            ControlMessage::AudioConfig {
                sample_rate,
                bits_per_sample,
                channels,
                frame_ms,
            } => {
                assert_eq!(sample_rate, 48_000);
                assert_eq!(bits_per_sample, 16);
                assert_eq!(channels, 1);
                assert_eq!(frame_ms, 20);
            }
            other => panic!("expected AudioConfig, got {other:?}"),
        }
    }

    #[test]
    fn control_deserialize_errors() {
        assert!(ControlMessage::deserialize(&[]).is_err());
        assert!(ControlMessage::deserialize(&[3]).is_err());
        assert!(ControlMessage::deserialize(&[3, 7]).is_err());
        assert!(ControlMessage::deserialize(&[4, 0, 0]).is_err());
        assert!(ControlMessage::deserialize(&[6, 0, 0]).is_err());
        assert!(ControlMessage::deserialize(&[99]).is_err());
    }

    #[test]
    fn control_frame_is_decodable() {
        let wire = ControlMessage::ConnectRequest.to_frame();
        match decode_frame(&wire) {
            FrameDecodeResult::Frame {
                frame_type,
                payload,
                ..
            } => {
                assert_eq!(frame_type, FrameType::Control);
                assert_eq!(
                    ControlMessage::deserialize(&payload).unwrap(),
                    ControlMessage::ConnectRequest
                );
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }
}
