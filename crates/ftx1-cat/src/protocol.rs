//! CAT frame encode/decode for the FTX-1.
//!
//! The radio speaks semicolon-terminated ASCII frames. A frame starts with a
//! two-letter command code; for certain commands a following digit (the VFO
//! or meter selector) is part of the command name rather than the payload
//! (`MD0`, `SM1`, `RM5`). This module parameterizes that split via
//! [`DIGIT_SUFFIX_PREFIXES`] so solicited responses and unsolicited AI
//! pushes decode identically.

use std::fmt;

/// The semicolon byte that terminates every CAT frame.
pub const TERMINATOR: u8 = b';';

/// The error response sent by the radio when it rejects a command.
pub const ERROR_RESPONSE: &[u8] = b"?;";

/// Discard the receive buffer if no terminator shows up within this many
/// bytes; the link is desynchronized or the port is mis-configured.
pub const MAX_FRAME_LEN: usize = 64;

/// Command prefixes whose first payload character is a selector digit that
/// belongs to the command name (`MD0` reads main-VFO mode, `MD1` sub).
pub const DIGIT_SUFFIX_PREFIXES: &[&str] = &[
    "MD", "SM", "RM", "GT", "AG", "RG", "SQ", "RL", "NL", "NB", "NR", "BC", "BP", "CO", "ML",
    "CN", "CT", "PR", "PA", "RA",
];

/// One decoded CAT frame: command prefix plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatFrame {
    /// Command prefix as echoed by the radio (e.g. `"FA"`, `"MD0"`).
    pub prefix: String,
    /// Payload between the prefix and the terminator.
    pub data: String,
}

impl CatFrame {
    /// Reassemble the wire form of this frame, terminator included.
    pub fn to_wire(&self) -> String {
        format!("{}{};", self.prefix, self.data)
    }
}

impl fmt::Display for CatFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{};", self.prefix, self.data)
    }
}

/// Result of attempting to decode one frame from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame was decoded; `consumed` bytes should be drained.
    Frame { frame: CatFrame, consumed: usize },

    /// The radio returned the error response `?;`.
    Error(usize),

    /// The buffer does not yet contain a complete frame.
    Incomplete,
}

/// Encode a command as `prefix + params + ';'`.
pub fn encode_command(prefix: &str, params: &str) -> Vec<u8> {
    let mut cmd = Vec::with_capacity(prefix.len() + params.len() + 1);
    cmd.extend_from_slice(prefix.as_bytes());
    cmd.extend_from_slice(params.as_bytes());
    cmd.push(TERMINATOR);
    cmd
}

/// Decode one semicolon-terminated frame from a byte buffer.
///
/// Returns the first complete frame found, or [`DecodeResult::Incomplete`]
/// if no terminator is present yet. Non-UTF-8 frame bodies are treated as
/// error frames and consumed.
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    if buf.is_empty() {
        return DecodeResult::Incomplete;
    }

    let term_pos = match buf.iter().position(|&b| b == TERMINATOR) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let consumed = term_pos + 1;
    let body = &buf[..term_pos];

    if body == b"?" {
        return DecodeResult::Error(consumed);
    }

    let body_str = match std::str::from_utf8(body) {
        Ok(s) => s,
        Err(_) => return DecodeResult::Error(consumed),
    };

    let prefix_end = prefix_len(body_str);
    let frame = CatFrame {
        prefix: body_str[..prefix_end].to_string(),
        data: body_str[prefix_end..].to_string(),
    };

    DecodeResult::Frame { frame, consumed }
}

/// Extract the command prefix from an outgoing command byte sequence.
///
/// This mirrors [`decode_frame`]'s prefix split so the link can match a
/// response to the command that solicited it:
///
/// - `FA014074000;` -> `"FA"`
/// - `MD02;` -> `"MD0"`
/// - `RC+0050;` -> `"RC"`
/// - `SM0;` -> `"SM0"`
pub fn extract_command_prefix(cmd: &[u8]) -> String {
    let s = std::str::from_utf8(cmd).unwrap_or("");
    let s = s.strip_suffix(';').unwrap_or(s);
    s[..prefix_len(s)].to_string()
}

/// Length of the command prefix at the start of `body`: leading ASCII
/// letters, plus one digit when the alphabetic part is a digit-suffix
/// command.
fn prefix_len(body: &str) -> usize {
    let alpha_end = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());

    let alpha_prefix = &body[..alpha_end];

    if DIGIT_SUFFIX_PREFIXES.contains(&alpha_prefix)
        && alpha_end < body.len()
        && body.as_bytes()[alpha_end].is_ascii_digit()
    {
        alpha_end + 1
    } else {
        alpha_end
    }
}
