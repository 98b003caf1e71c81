//! The shared CAT serial link.
//!
//! One serial line carries both command/response traffic and, once AI mode
//! is enabled, unsolicited state pushes from the radio. [`CatLink`] owns a
//! background reader task that is the only holder of the transport: commands
//! are sent to it over an `mpsc` channel and answered over `oneshot`, which
//! enforces the one-in-flight-command invariant by construction. Frames that
//! arrive while no matching request is pending are fanned out on a
//! `broadcast` channel.
//!
//! The reader prioritizes command handling over idle AI reads via
//! `select! { biased; }`, and never blocks on a slow push subscriber --
//! lagged receivers simply drop frames.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use ftx1_core::error::{Error, Result};
use ftx1_core::transport::Transport;

use crate::commands;
use crate::protocol::{self, CatFrame, DecodeResult, MAX_FRAME_LEN};

/// Default wait for a solicited response.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// Capacity of the unsolicited-frame fan-out channel. A subscriber that
/// falls this far behind starts losing pushes (never the reader).
const PUSH_CHANNEL_CAPACITY: usize = 256;

/// Poll interval for idle reads between commands.
const IDLE_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A request from a caller to the reader task.
enum LinkRequest {
    /// A CAT command. `expect_response` is false for void commands (pure
    /// sets like `TX1;` that the radio does not answer).
    Command {
        bytes: Vec<u8>,
        expect_response: bool,
        response_tx: oneshot::Sender<Result<Option<CatFrame>>>,
    },
    /// Raw passthrough for the rigctl `w` verb: returns the radio's reply
    /// verbatim, or echoes the command when the radio stays silent.
    Raw {
        bytes: Vec<u8>,
        response_tx: oneshot::Sender<Result<String>>,
    },
}

/// Handle to the shared CAT link.
///
/// Cheap to share via `Arc`; all methods take `&self`. Dropping the last
/// handle shuts the reader task down.
#[derive(Debug)]
pub struct CatLink {
    cmd_tx: mpsc::Sender<LinkRequest>,
    push_tx: broadcast::Sender<CatFrame>,
    link_down_rx: watch::Receiver<bool>,
    #[allow(dead_code)]
    task_handle: JoinHandle<()>,
}

impl CatLink {
    /// Take ownership of a transport and start the reader task.
    pub fn new(transport: Box<dyn Transport>, command_timeout: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<LinkRequest>(16);
        let (push_tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        let (link_down_tx, link_down_rx) = watch::channel(false);

        let task_handle = tokio::spawn(reader_loop(
            transport,
            command_timeout,
            push_tx.clone(),
            cmd_rx,
            link_down_tx,
        ));

        CatLink {
            cmd_tx,
            push_tx,
            link_down_rx,
            task_handle,
        }
    }

    /// Watch that flips to `true` when the reader loses the serial link.
    ///
    /// Sessions select on this so that a link failure reaches idle clients
    /// too, not just the one whose command happened to hit it.
    pub fn link_down(&self) -> watch::Receiver<bool> {
        self.link_down_rx.clone()
    }

    /// Send a responding command and wait for the frame whose prefix
    /// matches it.
    pub async fn transact(&self, cmd: Vec<u8>) -> Result<CatFrame> {
        match self.request(cmd, true).await? {
            Some(frame) => Ok(frame),
            None => Err(Error::Protocol("expected a response frame".into())),
        }
    }

    /// Send a void command (no response expected).
    pub async fn send(&self, cmd: Vec<u8>) -> Result<()> {
        self.request(cmd, false).await.map(|_| ())
    }

    /// Raw passthrough for the `w` / `send_cmd` verb.
    ///
    /// A trailing `;` is appended if missing. Returns the radio's reply
    /// text (terminator included); if the radio stays silent within the
    /// timeout the command itself is echoed back, matching the behavior of
    /// set commands that the radio acknowledges by echo.
    pub async fn send_raw(&self, text: &str) -> Result<String> {
        let mut wire = text.as_bytes().to_vec();
        if wire.last() != Some(&protocol::TERMINATOR) {
            wire.push(protocol::TERMINATOR);
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkRequest::Raw {
                bytes: wire,
                response_tx,
            })
            .await
            .map_err(|_| Error::LinkClosed)?;
        response_rx.await.map_err(|_| Error::LinkClosed)?
    }

    /// Subscribe to unsolicited frames (AI pushes).
    pub fn subscribe(&self) -> broadcast::Receiver<CatFrame> {
        self.push_tx.subscribe()
    }

    /// Enable AI mode: the radio starts pushing state changes unsolicited.
    pub async fn enable_auto_info(&self) -> Result<()> {
        self.send(commands::cmd_set_auto_info(true)).await
    }

    /// Disable AI mode.
    pub async fn disable_auto_info(&self) -> Result<()> {
        self.send(commands::cmd_set_auto_info(false)).await
    }

    async fn request(&self, bytes: Vec<u8>, expect_response: bool) -> Result<Option<CatFrame>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(LinkRequest::Command {
                bytes,
                expect_response,
                response_tx,
            })
            .await
            .map_err(|_| Error::LinkClosed)?;
        response_rx.await.map_err(|_| Error::LinkClosed)?
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

/// The main loop of the background reader task. Owns the transport
/// exclusively for the lifetime of the link.
async fn reader_loop(
    mut transport: Box<dyn Transport>,
    command_timeout: Duration,
    push_tx: broadcast::Sender<CatFrame>,
    mut cmd_rx: mpsc::Receiver<LinkRequest>,
    link_down_tx: watch::Sender<bool>,
) {
    let mut idle_buf: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            biased;

            // Priority: outgoing commands.
            req = cmd_rx.recv() => {
                match req {
                    Some(LinkRequest::Command { bytes, expect_response, response_tx }) => {
                        let result = execute_command(
                            &mut *transport,
                            &bytes,
                            expect_response,
                            command_timeout,
                            &push_tx,
                        )
                        .await;
                        let fatal = is_fatal(&result);
                        let _ = response_tx.send(result);
                        if fatal {
                            break;
                        }
                    }
                    Some(LinkRequest::Raw { bytes, response_tx }) => {
                        let result = execute_raw(
                            &mut *transport,
                            &bytes,
                            command_timeout,
                            &push_tx,
                        )
                        .await;
                        let fatal = matches!(&result, Err(e) if e.is_link_fatal());
                        let _ = response_tx.send(result);
                        if fatal {
                            break;
                        }
                    }
                    None => {
                        // All link handles dropped.
                        debug!("CAT link command channel closed, stopping reader");
                        break;
                    }
                }
            }

            // Idle: read unsolicited frames from the radio.
            res = idle_read(&mut *transport, &mut idle_buf, &push_tx) => {
                if let Err(e) = res {
                    warn!(error = %e, "CAT link lost, stopping reader");
                    break;
                }
            }
        }
    }

    let _ = transport.close().await;
    // Tell every session watcher the radio is unreachable.
    let _ = link_down_tx.send(true);
}

fn is_fatal(result: &Result<Option<CatFrame>>) -> bool {
    matches!(result, Err(e) if e.is_link_fatal())
}

/// One idle read cycle: pull whatever the radio pushed and fan out any
/// complete frames. Timeouts are normal here (quiet radio).
async fn idle_read(
    transport: &mut dyn Transport,
    idle_buf: &mut Vec<u8>,
    push_tx: &broadcast::Sender<CatFrame>,
) -> Result<()> {
    let mut buf = [0u8; 256];
    match transport.receive(&mut buf, IDLE_READ_TIMEOUT).await {
        Ok(n) if n > 0 => {
            idle_buf.extend_from_slice(&buf[..n]);
            drain_pushes(idle_buf, push_tx);
            Ok(())
        }
        Ok(_) | Err(Error::Timeout) => {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        }
        Err(Error::LinkClosed) => Err(Error::LinkClosed),
        Err(e) => Err(e),
    }
}

/// Drain all complete frames from the buffer into the push channel.
/// Incomplete data is left for the next read cycle, unless the buffer has
/// grown past [`MAX_FRAME_LEN`] without a terminator (desync).
fn drain_pushes(buf: &mut Vec<u8>, push_tx: &broadcast::Sender<CatFrame>) {
    loop {
        match protocol::decode_frame(buf) {
            DecodeResult::Frame { frame, consumed } => {
                buf.drain(..consumed);
                trace!(frame = %frame, "AI push");
                let _ = push_tx.send(frame);
            }
            DecodeResult::Error(consumed) => {
                buf.drain(..consumed);
                debug!("error frame in idle read, discarding");
            }
            DecodeResult::Incomplete => {
                if buf.len() > MAX_FRAME_LEN {
                    warn!(len = buf.len(), "no frame terminator, discarding buffer");
                    buf.clear();
                }
                break;
            }
        }
    }
}

/// Execute one CAT command on the transport.
///
/// Frames whose prefix does not match the command are treated as
/// interleaved AI pushes and fanned out while we keep waiting.
async fn execute_command(
    transport: &mut dyn Transport,
    cmd: &[u8],
    expect_response: bool,
    command_timeout: Duration,
    push_tx: &broadcast::Sender<CatFrame>,
) -> Result<Option<CatFrame>> {
    trace!(cmd = %String::from_utf8_lossy(cmd), "< sent");
    transport.send(cmd).await?;

    if !expect_response {
        return Ok(None);
    }

    let expected_prefix = protocol::extract_command_prefix(cmd);
    match await_frame(transport, &expected_prefix, command_timeout, push_tx).await? {
        Some(frame) => {
            trace!(frame = %frame, "> received");
            Ok(Some(frame))
        }
        None => Err(Error::Timeout),
    }
}

/// Execute a raw passthrough command.
async fn execute_raw(
    transport: &mut dyn Transport,
    cmd: &[u8],
    command_timeout: Duration,
    push_tx: &broadcast::Sender<CatFrame>,
) -> Result<String> {
    trace!(cmd = %String::from_utf8_lossy(cmd), "< sent (raw)");
    transport.send(cmd).await?;

    let expected_prefix = protocol::extract_command_prefix(cmd);
    match await_frame(transport, &expected_prefix, command_timeout, push_tx).await? {
        Some(frame) => Ok(frame.to_wire()),
        // Silent set: acknowledge by echoing the command back.
        None => Ok(String::from_utf8_lossy(cmd).into_owned()),
    }
}

/// Wait up to `command_timeout` for a frame matching `expected_prefix`.
///
/// Returns `Ok(None)` on timeout. The `?;` error frame maps to
/// [`Error::Protocol`]; non-matching frames are fanned out as pushes.
async fn await_frame(
    transport: &mut dyn Transport,
    expected_prefix: &str,
    command_timeout: Duration,
    push_tx: &broadcast::Sender<CatFrame>,
) -> Result<Option<CatFrame>> {
    let deadline = tokio::time::Instant::now() + command_timeout;
    let mut response_buf: Vec<u8> = Vec::new();
    let mut buf = [0u8; 256];

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }

        match tokio::time::timeout(remaining, transport.receive(&mut buf, remaining)).await {
            Ok(Ok(n)) => {
                response_buf.extend_from_slice(&buf[..n]);

                loop {
                    match protocol::decode_frame(&response_buf) {
                        DecodeResult::Frame { frame, consumed } => {
                            response_buf.drain(..consumed);
                            if frame.prefix == expected_prefix {
                                return Ok(Some(frame));
                            }
                            // Interleaved AI push while waiting.
                            let _ = push_tx.send(frame);
                        }
                        DecodeResult::Error(consumed) => {
                            response_buf.drain(..consumed);
                            return Err(Error::Protocol(
                                "radio returned error response (?;)".into(),
                            ));
                        }
                        DecodeResult::Incomplete => {
                            if response_buf.len() > MAX_FRAME_LEN {
                                warn!(
                                    len = response_buf.len(),
                                    "no frame terminator, discarding buffer"
                                );
                                response_buf.clear();
                            }
                            break;
                        }
                    }
                }
            }
            Ok(Err(Error::Timeout)) => return Ok(None),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Ok(None),
        }
    }
}
