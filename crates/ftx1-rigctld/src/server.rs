//! The rigctld-compatible TCP server.
//!
//! One session task per client. Each session interleaves two streams onto
//! its socket: replies to the client's own commands, and `AI:`-prefixed
//! lines carrying unsolicited CAT frames fanned out from the radio. Clients
//! that did not ask for AI must ignore lines that do not answer a pending
//! command.
//!
//! All radio access is serialized behind one `tokio::sync::Mutex` (the rig
//! lock): a session acquires it for the whole handle-one-line round trip,
//! so every client observes the radio in a consistent state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ftx1_cat::Radio;
use ftx1_core::error::{Error, Result};

use crate::translator;

/// Default rigctld listen port.
pub const DEFAULT_PORT: u16 = 4532;

/// How long `stop()` waits for sessions to finish before abandoning them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The rigctld TCP server.
pub struct RigctldServer {
    local_addr: std::net::SocketAddr,
    accept_handle: JoinHandle<()>,
    sessions: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl RigctldServer {
    /// Bind the listener and start accepting clients.
    pub async fn bind(addr: &str, radio: Arc<Mutex<Radio>>) -> Result<RigctldServer> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "rigctld listening");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sessions: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let accept_handle = tokio::spawn(accept_loop(
            listener,
            radio,
            Arc::clone(&sessions),
            shutdown_rx,
        ));

        Ok(RigctldServer {
            local_addr,
            accept_handle,
            sessions,
            shutdown_tx,
        })
    }

    /// The bound listen address (useful when binding port 0).
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Stop the server: close the listener first to unblock accept, then
    /// wind down sessions, waiting up to five seconds before abandoning
    /// them.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        self.accept_handle.abort();
        let _ = self.accept_handle.await;

        let handles: Vec<JoinHandle<()>> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain(..).collect()
        };

        let wind_down = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, wind_down).await.is_err() {
            warn!("rigctld sessions did not finish within grace period");
        }
        info!("rigctld stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    radio: Arc<Mutex<Radio>>,
    sessions: Arc<Mutex<Vec<JoinHandle<()>>>>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let client_ids = Arc::new(AtomicU64::new(1));

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let client_id = client_ids.fetch_add(1, Ordering::Relaxed);
                info!(client_id, %peer, "rigctl client connected");

                let handle = tokio::spawn(run_session(
                    socket,
                    client_id,
                    Arc::clone(&radio),
                    shutdown_rx.clone(),
                ));
                sessions.lock().await.push(handle);
            }
            Err(e) => {
                warn!(error = %e, "rigctld accept error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// One client session: read a line, translate under the rig lock, write
/// the reply; meanwhile forward AI pushes as `AI:<frame>` lines.
async fn run_session(
    socket: TcpStream,
    client_id: u64,
    radio: Arc<Mutex<Radio>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // Subscribe before serving so pushes arriving mid-command are queued
    // rather than lost. The link-down watch closes idle sessions when the
    // serial link dies (a session with a command in flight learns the
    // same thing from its reply).
    let (mut ai_rx, mut link_down) = {
        let radio = radio.lock().await;
        (radio.subscribe_ai(), radio.link_down())
    };

    let mut ai_open = true;

    let result: Result<()> = async {
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line? {
                        Some(line) => line,
                        None => break, // EOF
                    };
                    debug!(client_id, line = %line, "< rigctl");

                    let handled = {
                        let radio = radio.lock().await;
                        translator::handle_line(&radio, &line).await
                    };

                    debug!(
                        client_id,
                        reply = %handled.reply.escape_debug().to_string(),
                        "> rigctl"
                    );
                    write_half.write_all(handled.reply.as_bytes()).await?;
                    write_half.flush().await?;

                    if handled.link_closed {
                        warn!(client_id, "radio link lost, closing session");
                        break;
                    }
                }

                push = ai_rx.recv(), if ai_open => {
                    match push {
                        Ok(frame) => {
                            let line = format!("AI:{}\n", frame.to_wire());
                            write_half.write_all(line.as_bytes()).await?;
                            write_half.flush().await?;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            debug!(client_id, missed, "AI fan-out lagged, frames dropped");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            // No more pushes; session liveness is governed
                            // by the link-down watch.
                            ai_open = false;
                        }
                    }
                }

                down = link_down.changed() => {
                    if down.is_err() || *link_down.borrow() {
                        warn!(client_id, "radio link lost, closing session");
                        break;
                    }
                }

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => info!(client_id, "rigctl client disconnected"),
        Err(Error::Io(e)) => debug!(client_id, error = %e, "rigctl session I/O error"),
        Err(e) => debug!(client_id, error = %e, "rigctl session closed"),
    }
}
