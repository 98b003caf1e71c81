//! ftx1-cat: the FTX-1 CAT protocol engine.
//!
//! Layers, bottom up:
//!
//! - [`protocol`] -- semicolon-terminated frame encode/decode
//! - [`commands`] -- pure command builders and response parsers
//! - [`serial`] -- the tokio-serial [`Transport`](ftx1_core::Transport)
//! - [`link`] -- [`CatLink`]: the shared serial link with its background
//!   reader, one-in-flight command multiplexing, and AI push fan-out
//! - [`radio`] -- [`Radio`]: the typed facade with head-type detection
//!
//! Everything above the transport is testable without hardware via
//! `ftx1-test-harness`.

pub mod commands;
pub mod link;
pub mod protocol;
pub mod radio;
pub mod serial;

pub use link::{CatLink, DEFAULT_COMMAND_TIMEOUT};
pub use protocol::CatFrame;
pub use radio::Radio;
pub use serial::{SerialTransport, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};
