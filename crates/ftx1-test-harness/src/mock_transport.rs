//! The mock [`Transport`] implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ftx1_core::error::{Error, Result};
use ftx1_core::transport::Transport;

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to return from subsequent `receive()` calls. An empty
    /// response models a void command (the radio stays silent).
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockInner {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Response bytes pending for the next `receive()` call.
    pending_response: Vec<u8>,
    /// Unsolicited bytes (AI pushes) delivered when no response is pending.
    unsolicited: VecDeque<Vec<u8>>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
}

/// Shared handle for manipulating a [`MockTransport`] after it has been
/// moved into the link's reader task.
#[derive(Debug, Clone)]
pub struct MockController {
    inner: Arc<Mutex<MockInner>>,
}

impl MockController {
    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, subsequent
    /// `receive()` calls return `response`. Expectations are consumed in
    /// order; a mismatched send fails the exchange.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .expectations
            .push_back(Expectation {
                request: request.to_vec(),
                response: response.to_vec(),
            });
    }

    /// Queue unsolicited bytes, returned by `receive()` when no solicited
    /// response is pending. This models AI pushes from the radio.
    pub fn push_unsolicited(&self, data: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .unsolicited
            .push_back(data.to_vec());
    }

    /// All data sent through the transport so far, one entry per `send()`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent_log.clone()
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.inner.lock().unwrap().expectations.len()
    }

    /// Flip the connected state. When disconnected, `send()` and
    /// `receive()` return [`Error::LinkClosed`].
    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().unwrap().connected = connected;
    }
}

/// A mock [`Transport`] for testing the CAT engine without hardware.
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockInner {
                connected: true,
                ..Default::default()
            })),
        }
    }

    /// Obtain a controller that stays usable after the transport is moved.
    pub fn controller(&self) -> MockController {
        MockController {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(Error::LinkClosed);
        }

        inner.sent_log.push(data.to_vec());

        match inner.expectations.pop_front() {
            Some(expectation) => {
                if data != expectation.request.as_slice() {
                    return Err(Error::Protocol(format!(
                        "unexpected send data: expected {:?}, got {:?}",
                        String::from_utf8_lossy(&expectation.request),
                        String::from_utf8_lossy(data),
                    )));
                }
                inner.pending_response.extend_from_slice(&expectation.response);
                Ok(())
            }
            None => Err(Error::Protocol(format!(
                "no more expectations in mock transport (sent {:?})",
                String::from_utf8_lossy(data),
            ))),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.connected {
                return Err(Error::LinkClosed);
            }

            if !inner.pending_response.is_empty() {
                let n = inner.pending_response.len().min(buf.len());
                buf[..n].copy_from_slice(&inner.pending_response[..n]);
                inner.pending_response.drain(..n);
                return Ok(n);
            }

            if let Some(push) = inner.unsolicited.pop_front() {
                let n = push.len().min(buf.len());
                buf[..n].copy_from_slice(&push[..n]);
                if n < push.len() {
                    let rest = push[n..].to_vec();
                    inner.unsolicited.push_front(rest);
                }
                return Ok(n);
            }
        }

        // Nothing to deliver: behave like a quiet serial port. Sleep a
        // short slice of the timeout so reader loops do not spin.
        tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
        Err(Error::Timeout)
    }

    async fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.pending_response.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_send_receive() {
        let mut mock = MockTransport::new();
        let ctl = mock.controller();
        ctl.expect(b"FA;", b"FA014074000;");

        mock.send(b"FA;").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"FA014074000;");
    }

    #[tokio::test]
    async fn tracks_sent_data() {
        let mut mock = MockTransport::new();
        let ctl = mock.controller();
        ctl.expect(b"FA;", b"FA014074000;");
        ctl.expect(b"TX1;", b"");

        mock.send(b"FA;").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = mock.receive(&mut buf, Duration::from_millis(10)).await;
        mock.send(b"TX1;").await.unwrap();

        let sent = ctl.sent_data();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], b"FA;");
        assert_eq!(sent[1], b"TX1;");
        assert_eq!(ctl.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.controller().expect(b"FA;", b"FA014074000;");

        let result = mock.send(b"FB;").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(b"FA;").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn receive_without_send_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn unsolicited_delivered_when_idle() {
        let mut mock = MockTransport::new();
        let ctl = mock.controller();
        ctl.push_unsolicited(b"FA014074050;");

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"FA014074050;");
    }

    #[tokio::test]
    async fn solicited_response_beats_unsolicited() {
        let mut mock = MockTransport::new();
        let ctl = mock.controller();
        ctl.push_unsolicited(b"MD02;");
        ctl.expect(b"FA;", b"FA014074000;");

        mock.send(b"FA;").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"FA014074000;");

        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"MD02;");
    }

    #[tokio::test]
    async fn disconnect_fails_operations() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());
        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"FA;").await;
        assert!(matches!(result.unwrap_err(), Error::LinkClosed));

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::LinkClosed));
    }

    #[tokio::test]
    async fn partial_receive_with_small_buffer() {
        let mut mock = MockTransport::new();
        let ctl = mock.controller();
        ctl.expect(b"FA;", b"FA014074000;");

        mock.send(b"FA;").await.unwrap();

        let mut buf = [0u8; 4];
        let mut collected = Vec::new();
        loop {
            match mock.receive(&mut buf, Duration::from_millis(10)).await {
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(Error::Timeout) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(collected, b"FA014074000;");
    }
}
