//! ftx1-rigctld: the Hamlib rigctld-compatible front end.
//!
//! - [`translator`] -- stateless mapping from rigctl verbs to [`Radio`]
//!   calls and back to the wire format, including `dump_state`
//! - [`server`] -- the TCP line server with per-client sessions and AI
//!   push fan-out
//!
//! [`Radio`]: ftx1_cat::Radio

pub mod server;
pub mod translator;

pub use server::{RigctldServer, DEFAULT_PORT};
