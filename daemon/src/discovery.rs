//! UDP LAN discovery responder.
//!
//! Lets clients locate the daemon without a configured IP address:
//!
//! - Request: `FTX1-DISCOVER` (UDP, default port 4534, broadcast or
//!   unicast)
//! - Response: `FTX1-SERVER|ip|catPort|audioPort|rigModel|callsign`
//!
//! The advertised IP is the local address of the interface used to reach
//! the requester, so a multi-homed host answers with the address that is
//! actually routable from the client's side.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default UDP port for discovery traffic.
pub const DISCOVERY_PORT: u16 = 4534;
/// The datagram clients broadcast to find servers.
pub const DISCOVER_REQUEST: &str = "FTX1-DISCOVER";
/// Leading field of every response datagram.
pub const SERVER_RESPONSE_PREFIX: &str = "FTX1-SERVER";

/// What a discovery response advertises.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// The rigctld protocol port.
    pub cat_port: u16,
    /// The audio bridge port (0 when audio is not enabled).
    pub audio_port: u16,
    /// Rig model string, normally `FTX-1`.
    pub rig_model: String,
    /// Operator callsign; empty when unset.
    pub callsign: String,
}

/// The UDP discovery responder.
pub struct DiscoveryServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl DiscoveryServer {
    /// Bind the discovery socket and start answering requests.
    pub async fn bind(addr: &str, info: ServerInfo) -> std::io::Result<DiscoveryServer> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(true)?;
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "discovery responder listening");

        let handle = tokio::spawn(listen_loop(socket, info));
        Ok(DiscoveryServer { local_addr, handle })
    }

    /// The bound socket address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop answering discovery requests.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn listen_loop(socket: UdpSocket, info: ServerInfo) {
    let mut buf = [0u8; 256];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, peer)) => {
                let message = String::from_utf8_lossy(&buf[..n]);
                if message.trim() != DISCOVER_REQUEST {
                    debug!(%peer, "ignoring non-discovery datagram");
                    continue;
                }

                debug!(%peer, "discovery request");
                let response = build_response(&info, &local_ip_for(peer).await);
                if let Err(e) = socket.send_to(response.as_bytes(), peer).await {
                    warn!(%peer, error = %e, "failed to send discovery response");
                }
            }
            Err(e) => {
                warn!(error = %e, "discovery receive error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

fn build_response(info: &ServerInfo, ip: &str) -> String {
    format!(
        "{SERVER_RESPONSE_PREFIX}|{ip}|{}|{}|{}|{}",
        info.cat_port, info.audio_port, info.rig_model, info.callsign,
    )
}

/// The local address used to reach `peer`: connect a throwaway UDP socket
/// toward it and read the source address the stack picked.
async fn local_ip_for(peer: SocketAddr) -> String {
    let bind_addr = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let fallback = "127.0.0.1".to_string();

    let probe = match UdpSocket::bind(bind_addr).await {
        Ok(s) => s,
        Err(_) => return fallback,
    };
    if probe.connect(peer).await.is_err() {
        return fallback;
    }
    match probe.local_addr() {
        Ok(addr) => addr.ip().to_string(),
        Err(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_info() -> ServerInfo {
        ServerInfo {
            cat_port: 4532,
            audio_port: 4533,
            rig_model: "FTX-1".into(),
            callsign: "KJ5HST".into(),
        }
    }

    async fn start() -> (DiscoveryServer, UdpSocket) {
        let server = DiscoveryServer::bind("127.0.0.1:0", test_info())
            .await
            .expect("bind discovery");
        let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");
        (server, client)
    }

    async fn recv_string(client: &UdpSocket) -> String {
        let mut buf = [0u8; 256];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no discovery response")
            .expect("receive failed");
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn response_format() {
        let response = build_response(&test_info(), "192.168.1.100");
        assert_eq!(response, "FTX1-SERVER|192.168.1.100|4532|4533|FTX-1|KJ5HST");
    }

    #[test]
    fn response_with_empty_callsign() {
        let mut info = test_info();
        info.callsign = String::new();
        let response = build_response(&info, "10.0.0.2");
        assert_eq!(response, "FTX1-SERVER|10.0.0.2|4532|4533|FTX-1|");
        assert_eq!(response.split('|').count(), 6);
    }

    #[tokio::test]
    async fn responds_to_discovery_request() {
        let (server, client) = start().await;

        client
            .send_to(DISCOVER_REQUEST.as_bytes(), server.local_addr())
            .await
            .unwrap();

        let reply = recv_string(&client).await;
        let fields: Vec<&str> = reply.split('|').collect();
        assert_eq!(fields.len(), 6, "unexpected reply: {reply:?}");
        assert_eq!(fields[0], SERVER_RESPONSE_PREFIX);
        // Reached over loopback, so loopback is the advertised address.
        assert_eq!(fields[1], "127.0.0.1");
        assert_eq!(fields[2], "4532");
        assert_eq!(fields[3], "4533");
        assert_eq!(fields[4], "FTX-1");
        assert_eq!(fields[5], "KJ5HST");

        server.stop().await;
    }

    #[tokio::test]
    async fn ignores_non_discovery_datagrams() {
        let (server, client) = start().await;

        // Garbage first; it must not be answered.
        client
            .send_to(b"who goes there", server.local_addr())
            .await
            .unwrap();
        client
            .send_to(DISCOVER_REQUEST.as_bytes(), server.local_addr())
            .await
            .unwrap();

        // The only reply is the discovery response.
        let reply = recv_string(&client).await;
        assert!(reply.starts_with(SERVER_RESPONSE_PREFIX));

        let mut buf = [0u8; 256];
        let extra =
            tokio::time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
        assert!(extra.is_err(), "unexpected second datagram");

        server.stop().await;
    }

    #[tokio::test]
    async fn trailing_whitespace_is_tolerated() {
        let (server, client) = start().await;

        client
            .send_to(b"FTX1-DISCOVER\n", server.local_addr())
            .await
            .unwrap();

        let reply = recv_string(&client).await;
        assert!(reply.starts_with(SERVER_RESPONSE_PREFIX));

        server.stop().await;
    }
}
