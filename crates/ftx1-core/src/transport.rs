//! Transport trait for radio communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the radio.
//! Implementations exist for serial ports (the real CAT link) and mock
//! transports for testing.
//!
//! The CAT engine operates on a `Transport` rather than directly on a serial
//! port, enabling both real hardware control and deterministic unit testing
//! with `MockTransport` from the `ftx1-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the radio.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Protocol-level concerns (CAT command structure, the `;`
/// terminator) are handled by the CAT engine that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the radio.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport (serial TX buffer, socket, etc.).
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the radio into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::LinkClosed`](crate::error::Error::LinkClosed).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
