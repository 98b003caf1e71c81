//! ftx1-core: shared types, errors, and the transport trait for the FTX-1
//! Hamlib bridge.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! - [`Vfo`], [`Mode`], [`HeadType`] -- radio state types spanning the
//!   Hamlib and CAT vocabularies
//! - [`Transport`] -- byte-level communication channel to the radio
//! - [`Error`] / [`Result`] -- error handling
//!
//! The CAT engine, the rigctld front end, and the audio bridge all depend
//! on these types without depending on each other.

pub mod error;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use ftx1_core::*`.
pub use error::{Error, Result};
pub use transport::Transport;
pub use types::*;
